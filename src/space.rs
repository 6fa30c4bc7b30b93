//! `olympus space use|clear|show`: the default space for `ask`.

use anyhow::{bail, Result};

use crate::state::PreferencesStore;

pub fn run_use(prefs: &PreferencesStore, space_id: &str) -> Result<()> {
    let space_id = space_id.trim();
    if space_id.is_empty() {
        bail!("space id must not be empty");
    }
    prefs.update(|p| p.active_space_id = Some(space_id.to_string()))?;
    println!("Active space: {}", space_id);
    Ok(())
}

pub fn run_clear(prefs: &PreferencesStore) -> Result<()> {
    prefs.update(|p| p.active_space_id = None)?;
    println!("Active space cleared.");
    Ok(())
}

/// Whether `ask` saves queries when neither `--save` nor `--no-save` is given.
pub fn run_persist(prefs: &PreferencesStore, enabled: bool) -> Result<()> {
    prefs.update(|p| p.persist_queries = enabled)?;
    println!(
        "Queries will {}be saved by default.",
        if enabled { "" } else { "not " }
    );
    Ok(())
}

pub fn run_show(prefs: &PreferencesStore) -> Result<()> {
    let current = prefs.get();
    match current.active_space_id {
        Some(id) => println!("Active space: {}", id),
        None => println!("No active space."),
    }
    println!(
        "Save queries by default: {}",
        if current.persist_queries { "yes" } else { "no" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PreferencesStore::hydrate(dir.path().join("preferences.json"));

        run_use(&prefs, " space-9 ").unwrap();
        assert_eq!(prefs.get().active_space_id.as_deref(), Some("space-9"));

        run_clear(&prefs).unwrap();
        assert_eq!(prefs.get().active_space_id, None);
    }

    #[test]
    fn test_persist_keeps_space() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PreferencesStore::hydrate(dir.path().join("preferences.json"));
        run_use(&prefs, "s1").unwrap();
        run_persist(&prefs, true).unwrap();
        let current = prefs.get();
        assert!(current.persist_queries);
        assert_eq!(current.active_space_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_use_rejects_blank() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PreferencesStore::hydrate(dir.path().join("preferences.json"));
        assert!(run_use(&prefs, "  ").is_err());
    }
}
