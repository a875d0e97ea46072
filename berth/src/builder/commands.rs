//! Effective build command resolution
//!
//! Explicit overrides win, then the framework preset, then the generic npm
//! pair.

/// Resolved install/build command pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommands {
    pub install: String,
    pub build: String,
}

const DEFAULT_INSTALL: &str = "npm install";
const DEFAULT_BUILD: &str = "npm run build";

fn framework_defaults(framework: &str) -> Option<(&'static str, &'static str)> {
    match framework {
        "react" => Some((DEFAULT_INSTALL, DEFAULT_BUILD)),
        "vite" => Some((DEFAULT_INSTALL, "npx vite build")),
        // Plain file trees are published as-is.
        "static" => Some(("true", "true")),
        _ => None,
    }
}

/// Resolve the commands actually run for a build
pub fn resolve(
    framework: Option<&str>,
    install_override: Option<&str>,
    build_override: Option<&str>,
) -> BuildCommands {
    let preset = framework.and_then(framework_defaults);
    let (preset_install, preset_build) = preset.unwrap_or((DEFAULT_INSTALL, DEFAULT_BUILD));

    BuildCommands {
        install: install_override
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(preset_install)
            .to_string(),
        build: build_override
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(preset_build)
            .to_string(),
    }
}

impl BuildCommands {
    /// Single shell line chaining install and build
    pub fn shell_line(&self) -> String {
        format!("{} && {}", self.install, self.build)
    }
}
