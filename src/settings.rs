use crate::editor::DEFAULT_EDITOR;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Settings {
    pub output_root: PathBuf,
    // The directory underneath which each scenario gets its own directory,
    // optionally inside a directory named after its group.
    pub editor: String,
    // Key of the configuration editor in the editor registry.
    pub mcs_mode: bool,
    // Whether we are preparing a Monte-Carlo simulation.  Baselines then
    // get an extra "mcsValues" component.
    pub setup_output: Option<PathBuf>,
    // Where to write the expanded setup after the static pass, for auditing
    // what was actually run.
    pub verbose: bool,
    // Show debug traces, unless RUST_LOG says otherwise.
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_root: PathBuf::from("."),
            editor: DEFAULT_EDITOR.to_string(),
            mcs_mode: false,
            setup_output: None,
            verbose: false,
        }
    }
}
