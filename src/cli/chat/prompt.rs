use rustyline::{Config, EditMode, Editor, Result};

const DEFAULT_PROMPT: &str = "> ";

pub fn generate_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

/// Line editor for chat input. History lives only as long as the process.
pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .edit_mode(EditMode::Emacs)
        .max_history_size(1000)
        .build();
    Editor::with_config(config)
}
