//! Persona bank tests
//!
//! Discovery and loading against the agent bank under `tests/fixtures`.

use std::path::PathBuf;

use poll_core::config::PopulationConfig;
use poll_core::{FsPersonaStore, Population, PersonaStore, BASELINE_AGENT_ID};

fn bank() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/agent_bank/populations")
}

fn store() -> FsPersonaStore {
    FsPersonaStore::new(&PopulationConfig {
        root: bank().join("gss_agents"),
        baseline_dir: bank().join("single_agent"),
        baseline_id: BASELINE_AGENT_ID.to_string(),
    })
}

#[test]
fn test_discovery_is_sorted_and_recursive() {
    let population = Population::discover(&bank().join("gss_agents"));

    assert_eq!(
        population.members(),
        &[
            "gss_0001".to_string(),
            "gss_0002".to_string(),
            "gss_0003".to_string(),
            "gss_0004".to_string(),
            "gss_0005".to_string(),
            "wave2/gss_0101".to_string(),
        ]
    );
}

#[test]
fn test_directories_missing_a_record_are_excluded() {
    let population = Population::discover(&bank().join("gss_agents"));
    assert!(!population.contains("incomplete"));
}

#[test]
fn test_missing_root_is_empty() {
    let population = Population::discover(&bank().join("does_not_exist"));
    assert!(population.is_empty());
}

#[test]
fn test_load_population_member() {
    let agent = store().load("gss_0004").unwrap();

    assert_eq!(agent.full_name(), "Robert Miller");
    assert!(agent.self_description().starts_with("first_name: Robert\nlast_name: Miller\nage: 68"));

    let nodes = agent
        .memory()
        .retrieve(&["How often do you attend religious services?".to_string()], 0, 1);
    assert_eq!(nodes[0].content, "Our congregation meets every Sunday and Wednesday.");
}

#[test]
fn test_load_nested_member() {
    let agent = store().load("wave2/gss_0101").unwrap();
    assert_eq!(agent.full_name(), "Dana Reyes");
}

#[test]
fn test_load_baseline_persona() {
    let agent = store().load(BASELINE_AGENT_ID).unwrap();
    assert_eq!(agent.id(), BASELINE_AGENT_ID);
    assert_eq!(agent.full_name(), "Joon Park");
}

#[test]
fn test_incomplete_persona_fails_to_load() {
    assert!(store().load("incomplete").is_err());
}

#[cfg(unix)]
#[test]
fn test_symlinked_directories_are_not_followed() {
    use std::fs;
    use std::os::unix::fs::symlink;

    let tmp = tempfile::tempdir().unwrap();
    let agent = tmp.path().join("gss_0001");
    fs::create_dir_all(&agent).unwrap();
    fs::write(agent.join("meta.json"), "{}").unwrap();
    fs::write(agent.join("scratch.json"), r#"{"first_name": "Ana"}"#).unwrap();

    // A link back to the root, and one to the agent itself
    symlink(tmp.path(), tmp.path().join("loop")).unwrap();
    symlink(&agent, tmp.path().join("alias")).unwrap();

    let population = Population::discover(tmp.path());
    assert_eq!(population.members(), &["gss_0001".to_string()]);
}
