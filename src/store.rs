//! Settings store: loads and persists the profile set.

use crate::error::{Error, Result};
use crate::grid::{GridProfile, ProfileSet};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence for grid profiles
pub trait SettingsStore: Send + Sync {
    /// All profiles plus the selected name
    fn load(&self) -> Result<ProfileSet>;

    /// Create or overwrite one profile
    fn save_profile(&self, name: &str, profile: &GridProfile) -> Result<()>;
}

/// Profile set kept in a TOML file.
///
/// A missing file reads as the default set; the file is created on first save.
pub struct TomlStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl TomlStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ProfileSet> {
        if !self.path.exists() {
            log::debug!("No profile file at {:?}, using defaults", self.path);
            return Ok(ProfileSet::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Replace the whole set
    pub fn write(&self, set: &ProfileSet) -> Result<()> {
        let contents = toml::to_string_pretty(set)?;
        // Write next to the target, then rename so readers never see half a file
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for TomlStore {
    fn load(&self) -> Result<ProfileSet> {
        let _guard = self.write_lock.lock();
        self.read()
    }

    fn save_profile(&self, name: &str, profile: &GridProfile) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut set = self.read()?;
        set.profiles.insert(name.to_string(), profile.clone());
        self.write(&set)?;
        log::info!("Saved profile '{}' to {:?}", name, self.path);
        Ok(())
    }
}

/// Profile set held in memory
#[derive(Default)]
pub struct MemoryStore {
    set: Mutex<ProfileSet>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new(set: ProfileSet) -> Self {
        Self {
            set: Mutex::new(set),
            fail_saves: false,
        }
    }

    /// Store with `profile` as the only, selected profile
    pub fn with_profile(name: &str, profile: GridProfile) -> Self {
        let mut set = ProfileSet {
            selected_profile: name.to_string(),
            profiles: Default::default(),
        };
        set.profiles.insert(name.to_string(), profile);
        Self::new(set)
    }

    /// Store whose saves always fail, for exercising error paths
    pub fn read_only(set: ProfileSet) -> Self {
        Self {
            set: Mutex::new(set),
            fail_saves: true,
        }
    }

    /// Change the selected profile
    pub fn select(&self, name: &str) {
        self.set.lock().selected_profile = name.to_string();
    }

    /// Current contents
    pub fn snapshot(&self) -> ProfileSet {
        self.set.lock().clone()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<ProfileSet> {
        Ok(self.set.lock().clone())
    }

    fn save_profile(&self, name: &str, profile: &GridProfile) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Other("settings store is read-only".to_string()));
        }
        self.set
            .lock()
            .profiles
            .insert(name.to_string(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlStore::new(dir.path().join("profiles.toml"));
        assert_eq!(store.load().unwrap(), ProfileSet::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlStore::new(dir.path().join("profiles.toml"));

        let profile = GridProfile {
            count_x: 2,
            count_y: 2,
            max_x: 10.0,
            max_y: 10.0,
            safe_homing: true,
            fade: 3.5,
            ..Default::default()
        }
        .with_matrix(
            vec![
                [0.0, 0.0, 0.1],
                [10.0, 0.0, -0.2],
                [0.0, 10.0, 0.3],
                [10.0, 10.0, 0.0],
            ],
            1_700_000_000.5,
        );
        store.save_profile("pcb", &profile).unwrap();

        let set = store.load().unwrap();
        assert_eq!(set.selected_profile, "disabled");
        assert_eq!(set.profiles["pcb"], profile);
        assert!(set.profiles.contains_key("disabled"));
    }

    #[test]
    fn test_toml_layout() {
        let toml_content = r#"
selected_profile = "board"

[profiles.board]
min_x = 5.0
max_x = 95.0
min_y = 5.0
max_y = 65.0
count_x = 4
count_y = 3
lift = 2.0
"#;
        let set: ProfileSet = toml::from_str(toml_content).unwrap();
        let board = set.active().unwrap();
        assert_eq!(board.count_x, 4);
        assert_eq!(board.lift, 2.0);
        assert!(board.matrix.is_empty());
        assert!(!board.safe_homing);
    }

    #[test]
    fn test_memory_store_read_only() {
        let store = MemoryStore::read_only(ProfileSet::default());
        assert!(store.save_profile("x", &GridProfile::default()).is_err());
        assert_eq!(store.snapshot(), ProfileSet::default());
    }
}
