use crate::ontology::OntologyConfig;

/// Animal taxonomy with a few relationships and a `human -> person` synonym.
#[must_use]
pub fn animals() -> OntologyConfig {
    OntologyConfig::new()
        .with_types([
            "animal", "bird", "canary", "penguin", "fish", "person", "has_wings", "can_fly",
        ])
        .with_relationships(["likes", "eats", "parent", "ancestor"])
        .with_constraints(["unique_name"])
        .with_synonym("human", "person")
}

/// [`animals`] without the `animal` type.
#[must_use]
pub fn animals_without_animal() -> OntologyConfig {
    let mut config = animals();
    config.types.retain(|name| name != "animal");
    config
}

/// Program deriving `has_wings(tweety)` through two rules.
#[must_use]
pub fn canary_program() -> Vec<String> {
    vec![
        "canary(tweety).".to_string(),
        "bird(X) :- canary(X).".to_string(),
        "has_wings(X) :- bird(X).".to_string(),
    ]
}
