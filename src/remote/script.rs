//! Rendering and staging of the remote driver script.

use crate::error::{Error, Result};
use crate::remote::transfer::FileTransfer;
use log::info;
use std::fs;
use std::path::Path;

pub const UNSOLVED_PLACEHOLDER: &str = "{model_unsolved_file}";
pub const KWARGS_PLACEHOLDER: &str = "{solve_kwargs}";
pub const SOLVED_PLACEHOLDER: &str = "{model_solved_file}";

/// Default driver: load the unsolved model, solve it, write the result.
pub const DEFAULT_TEMPLATE: &str = r#"
import linopy

m = linopy.read_netcdf("{model_unsolved_file}")
m.solve({solve_kwargs})
m.to_netcdf("{model_solved_file}")
"#;

/// Produces the remote driver script from the three payload values.
///
/// Implementations must be pure: identical inputs give identical text.
pub trait ScriptRenderer {
    fn render(&self, unsolved_path: &str, solved_path: &str, options: &str) -> String;
}

impl<F> ScriptRenderer for F
where
    F: Fn(&str, &str, &str) -> String,
{
    fn render(&self, unsolved_path: &str, solved_path: &str, options: &str) -> String {
        self(unsolved_path, solved_path, options)
    }
}

/// Placeholder-substitution renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateScript {
    template: String,
}

impl Default for TemplateScript {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl TemplateScript {
    /// Creates a renderer from template text.
    ///
    /// Every placeholder must appear at least once.
    pub fn new(template: String) -> Result<Self> {
        let missing: Vec<&str> = [UNSOLVED_PLACEHOLDER, KWARGS_PLACEHOLDER, SOLVED_PLACEHOLDER]
            .into_iter()
            .filter(|p| !template.contains(p))
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Script template is missing placeholder(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self { template })
    }

    /// Loads a template from a local file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read script template {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(template)
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl ScriptRenderer for TemplateScript {
    fn render(&self, unsolved_path: &str, solved_path: &str, options: &str) -> String {
        let values = [
            (UNSOLVED_PLACEHOLDER, unsolved_path),
            (SOLVED_PLACEHOLDER, solved_path),
            (KWARGS_PLACEHOLDER, options),
        ];

        // Substituted values are never scanned for placeholders.
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        loop {
            let next = values
                .iter()
                .filter_map(|&(p, v)| rest.find(p).map(|at| (at, p, v)))
                .min_by_key(|&(at, _, _)| at);
            let Some((at, placeholder, value)) = next else {
                break;
            };
            out.push_str(&rest[..at]);
            out.push_str(value);
            rest = &rest[at + placeholder.len()..];
        }
        out.push_str(rest);
        out
    }
}

/// Writes the rendered script to `remote_path` on the remote.
pub fn stage_script<T: FileTransfer + ?Sized>(
    script: &str,
    remote_path: &str,
    transfer: &mut T,
) -> Result<()> {
    info!("Saving driver script at {} on remote", remote_path);
    transfer.write_remote(remote_path, script.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_template_embeds_inputs() {
        let script = TemplateScript::default().render("/tmp/a.nc", "/tmp/b.nc", "{'method':'x'}");

        assert!(script.contains(r#"m = linopy.read_netcdf("/tmp/a.nc")"#));
        assert!(script.contains("m.solve({'method':'x'})"));
        assert!(script.contains(r#"m.to_netcdf("/tmp/b.nc")"#));
        assert!(!script.contains(UNSOLVED_PLACEHOLDER));
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let renderer = TemplateScript::new(
            "a={model_unsolved_file} b={model_solved_file} c={solve_kwargs}".to_string(),
        )
        .unwrap();

        let script = renderer.render("/tmp/{solve_kwargs}.nc", "/tmp/{model_unsolved_file}", "**{}");
        assert_eq!(
            script,
            "a=/tmp/{solve_kwargs}.nc b=/tmp/{model_unsolved_file} c=**{}"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = TemplateScript::default();
        let first = renderer.render("/tmp/a.nc", "/tmp/b.nc", "**{}");
        let second = renderer.render("/tmp/a.nc", "/tmp/b.nc", "**{}");
        assert_eq!(first, second);
    }

    #[test]
    fn test_template_missing_placeholder_rejected() {
        let err = TemplateScript::new("print('{model_unsolved_file}')".to_string()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(KWARGS_PLACEHOLDER));
        assert!(msg.contains(SOLVED_PLACEHOLDER));
    }

    #[test]
    fn test_template_from_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            "run {model_unsolved_file} {model_solved_file} {solve_kwargs}",
        )
        .unwrap();

        let renderer = TemplateScript::from_file(file.path()).unwrap();
        assert_eq!(renderer.render("u", "s", "o"), "run u s o");
    }

    #[test]
    fn test_closure_renderer() {
        let renderer = |u: &str, s: &str, o: &str| format!("{}|{}|{}", u, s, o);
        assert_eq!(renderer.render("u", "s", "o"), "u|s|o");
    }

    struct MemoryRemote(HashMap<String, Vec<u8>>);

    impl FileTransfer for MemoryRemote {
        fn put(&mut self, _local: &Path, _remote: &str) -> Result<u64> {
            unreachable!("scripts are written directly")
        }

        fn get(&mut self, _remote: &str, _local: &Path) -> Result<u64> {
            unreachable!("scripts are written directly")
        }

        fn write_remote(&mut self, remote: &str, contents: &[u8]) -> Result<()> {
            self.0.insert(remote.to_string(), contents.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_stage_script_writes_directly() {
        let mut remote = MemoryRemote(HashMap::new());
        stage_script("print(1)\n", "/tmp/run.py", &mut remote).unwrap();
        assert_eq!(remote.0.get("/tmp/run.py").unwrap(), b"print(1)\n");
    }
}
