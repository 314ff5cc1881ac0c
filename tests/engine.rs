//! End-to-end scenarios over the whole pipeline: building a corpus from
//! files, retrieval, classification, reduction and persistence.

use std::fs;

use vectorspace::{
    Classifier, Corpus, Document, KMeansOptions, Metric, NaiveBayes, NearestNeighbor, Rank,
    Sample, TokenizeOptions, Weight,
};

fn farm_corpus() -> Corpus {
    let opts = TokenizeOptions::default();
    Corpus::from_documents(
        vec![
            Document::from_text(
                "the cat sat on the mat and purred at the birds",
                &opts,
            )
            .with_name("cat")
            .with_label("pet"),
            Document::from_text("the cow chews straw in the barn all day", &opts)
                .with_name("cow")
                .with_label("livestock"),
            Document::from_text("a bird sings in the tree and eats seeds", &opts)
                .with_name("bird")
                .with_label("pet"),
            Document::from_text("the pig rolls in mud beside the barn", &opts)
                .with_name("pig")
                .with_label("livestock"),
        ],
        Weight::TfIdf,
    )
}

#[test]
fn build_ingests_a_folder_of_text_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cat_facts.txt"), "cats purr and chase mice").unwrap();
    fs::write(dir.path().join("cow_facts.txt"), "cows chew straw slowly").unwrap();
    let pattern = format!("{}/*.txt", dir.path().display());
    let corpus = Corpus::build(&pattern, &TokenizeOptions::default()).unwrap();
    assert_eq!(corpus.len(), 2);
    // File stems become names, underscores become spaces.
    assert!(corpus.document("cat facts").is_some());
    assert!(corpus.document("cat facts").unwrap().contains("purr"));
}

#[test]
fn search_ranks_the_matching_document_first() {
    let corpus = farm_corpus();
    let opts = TokenizeOptions::default();
    let hits = corpus.vector_space_search(&["straw", "chews"], &opts, 10);
    assert!(!hits.is_empty());
    assert_eq!(hits[0].1.name(), Some("cow"));
    assert!(hits.windows(2).all(|w| w[0].0 >= w[1].0));
}

#[test]
fn document_frequencies_follow_removals() {
    let mut corpus = farm_corpus();
    assert!(corpus.document_frequency("barn") > corpus.document_frequency("straw"));
    let cow = corpus.document("cow").unwrap().id();
    corpus.remove(cow).unwrap();
    assert_eq!(corpus.document_frequency("straw"), 0.0);
    assert!(corpus.document_frequency("barn") > 0.0);
}

#[test]
fn knn_learns_the_farm_labels() {
    let corpus = farm_corpus();
    let mut knn = NearestNeighbor::new(3, Metric::Cosine);
    for document in &corpus {
        knn.train(
            Sample::Vector(&corpus.document_vector(document)),
            document.label(),
        );
    }
    let opts = TokenizeOptions::default();
    let query = Document::from_text("straw in the barn", &opts);
    let vector = corpus.document_vector(&query);
    assert_eq!(
        knn.classify(Sample::Vector(&vector)).as_deref(),
        Some("livestock")
    );
}

#[test]
fn single_neighbor_links_a_flying_thing_to_the_bird() {
    let opts = TokenizeOptions::default();
    let corpus = Corpus::from_documents(
        vec![
            Document::from_text("cats have stripes and purr", &opts).with_label("cat"),
            Document::from_text("cows moo and give milk", &opts).with_label("cow"),
            Document::from_text("birds have wings and fly", &opts).with_label("bird"),
        ],
        Weight::TfIdf,
    );
    let mut knn = NearestNeighbor::new(1, Metric::Cosine);
    for document in &corpus {
        knn.train(Sample::Document(document), None);
    }
    let query = Document::from_text("something that can fly", &opts);
    assert_eq!(
        knn.classify(Sample::Document(&query)).as_deref(),
        Some("bird")
    );
}

#[test]
fn naive_bayes_rejects_classes_with_no_shared_features() {
    let mut nb = NaiveBayes::new();
    nb.train(Sample::Tokens(&["feathers", "wings", "beak"]), Some("bird"));
    nb.train(Sample::Tokens(&["scales", "fins", "gills"]), Some("fish"));
    assert_eq!(
        nb.classify(Sample::Tokens(&["fins", "scales"])).as_deref(),
        Some("fish")
    );
    assert_eq!(
        nb.classify(Sample::Tokens(&["wings", "beak"])).as_deref(),
        Some("bird")
    );
}

#[test]
fn feature_selection_feeds_a_smaller_corpus() {
    let corpus = farm_corpus();
    let selected = corpus.feature_selection(5);
    assert_eq!(selected.len(), 5);
    let subset: Vec<&str> = selected.iter().map(String::as_str).collect();
    let filtered = corpus.filter(&subset);
    assert_eq!(filtered.len(), corpus.len());
    assert!(filtered.features().len() <= 5);
}

#[test]
fn clustering_separates_documents_in_concept_space() {
    let mut corpus = farm_corpus();
    corpus.reduce(Rank::Fixed(2)).unwrap();
    let mut options = KMeansOptions::new(2);
    options.seed = Some(11);
    let clusters = corpus.cluster_kmeans(&options);
    let total: usize = clusters.iter().map(Vec::len).sum();
    assert_eq!(total, corpus.len());
    assert_eq!(clusters.len(), 2);
}

#[test]
fn corpus_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("farm.cbor");
    let corpus = farm_corpus();
    // Warm the similarity cache so it is persisted.
    let cat = corpus.document("cat").unwrap();
    let bird = corpus.document("bird").unwrap();
    let similarity = corpus.cosine_similarity(cat, bird);
    corpus.save(&path, false).unwrap();

    let loaded = Corpus::load(&path).unwrap();
    assert_eq!(loaded.len(), 4);
    let cat = loaded.document("cat").unwrap();
    let bird = loaded.document("bird").unwrap();
    assert_eq!(cat.label(), Some("pet"));
    assert_eq!(loaded.cosine_similarity(cat, bird), similarity);
    // The loaded corpus is fully usable: frequencies and search still work.
    assert!(loaded.document_frequency("barn") > 0.0);
    let hits = loaded.vector_space_search(&["purred"], &TokenizeOptions::default(), 5);
    assert_eq!(hits[0].1.name(), Some("cat"));
}

#[test]
fn fresh_documents_never_collide_with_loaded_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("farm.cbor");
    farm_corpus().save(&path, true).unwrap();
    let mut loaded = Corpus::load(&path).unwrap();
    let opts = TokenizeOptions::default();
    let fresh = Document::from_text("a goat climbs the hill", &opts).with_name("goat");
    let fresh_id = fresh.id();
    loaded.append(fresh);
    assert!(loaded.iter().filter(|d| d.id() == fresh_id).count() == 1);
}
