//! Runtime search paths derived from the configuration store
//!
//! The in-process search list and the exported path-list variable are
//! deliberately ordered differently: the library directory is exported for the
//! runtime's own discovery but never appended in-process.

use serde::Serialize;

use super::ConfigStore;

pub const HOME_KEY: &str = "Paths.python_home_dir";
pub const LIB_KEY: &str = "Paths.lib_dir";
pub const SITE_PACKAGES_KEY: &str = "Paths.site_packages_dir";

/// Archive holding the standard library, relative to the home directory
#[cfg(windows)]
pub const ARCHIVE_RELATIVE: &str = "python311.zip";
#[cfg(not(windows))]
pub const ARCHIVE_RELATIVE: &str = "lib/python311.zip";

#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

pub const HOME_VAR: &str = "PYTHONHOME";
pub const PATH_VAR: &str = "PYTHONPATH";

/// Paths owned by a single worker run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathSet {
    pub home: String,
    pub lib_dir: String,
    pub site_packages: String,
    pub archive: String,
}

impl PathSet {
    /// Resolve paths from the store; missing keys become empty strings
    pub fn resolve(store: &ConfigStore) -> Self {
        let home = store.get(HOME_KEY, "");
        let archive = format!("{}{}{}", home, std::path::MAIN_SEPARATOR, ARCHIVE_RELATIVE);

        Self {
            lib_dir: store.get(LIB_KEY, ""),
            site_packages: store.get(SITE_PACKAGES_KEY, ""),
            archive,
            home,
        }
    }

    /// Ordered in-process module search paths: archive, then site-packages
    pub fn search_paths(&self) -> Vec<String> {
        vec![self.archive.clone(), self.site_packages.clone()]
    }

    /// Environment exports: archive, library directory, then site-packages
    pub fn environment(&self) -> EnvExports {
        let path_list = [
            self.archive.as_str(),
            self.lib_dir.as_str(),
            self.site_packages.as_str(),
        ]
        .join(&PATH_LIST_SEPARATOR.to_string());

        EnvExports {
            home: self.home.clone(),
            path_list,
        }
    }
}

/// The two environment-style variables exported before runtime start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvExports {
    pub home: String,
    pub path_list: String,
}

impl EnvExports {
    /// `(variable, value)` pairs in export order
    pub fn vars(&self) -> [(&'static str, &str); 2] {
        [(HOME_VAR, self.home.as_str()), (PATH_VAR, self.path_list.as_str())]
    }
}
