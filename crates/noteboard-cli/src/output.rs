//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use noteboard_core::{BoardEvent, Config, Connection, Note};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single note
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", note.id);
                println!("Title:    {}", note.title);
                if !note.content.is_empty() {
                    println!("Content:  {}", note.content);
                }
                println!("Position: ({}, {})", note.position.x, note.position.y);
                if !note.tags.is_empty() {
                    println!("Tags:     {}", note.tags.join(", "));
                }
                if note.is_pinned {
                    println!("Pinned:   yes");
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(note).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", note.id);
            }
        }
    }

    /// Print a list of notes
    pub fn print_notes(&self, notes: &[Note]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes on the board.");
                    return;
                }
                for note in notes {
                    let pin = if note.is_pinned { " *" } else { "" };
                    println!(
                        "{}  {}{}  ({}, {})",
                        note.id, note.title, pin, note.position.x, note.position.y
                    );
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(notes).unwrap());
            }
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Print a single connection
    pub fn print_connection(&self, conn: &Connection) {
        match self.format {
            OutputFormat::Human => {
                let label = if conn.label.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", conn.label)
                };
                println!("{}  {} -> {}{}", conn.id, conn.source, conn.target, label);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(conn).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", conn.id);
            }
        }
    }

    /// Print a list of connections
    pub fn print_connections(&self, connections: &[Connection]) {
        match self.format {
            OutputFormat::Human => {
                if connections.is_empty() {
                    println!("No connections on the board.");
                    return;
                }
                for conn in connections {
                    self.print_connection(conn);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(connections).unwrap());
            }
            OutputFormat::Quiet => {
                for conn in connections {
                    println!("{}", conn.id);
                }
            }
        }
    }

    /// Print one live board event as it arrives
    pub fn print_event(&self, event: &BoardEvent) {
        match self.format {
            OutputFormat::Human => {
                println!("{:<20}{}", event.kind().name(), event.entity_id());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(event).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", event.entity_id());
            }
        }
    }

    /// Print the resolved configuration
    pub fn print_config(&self, config: &Config) {
        match self.format {
            OutputFormat::Human => {
                println!("Configuration:");
                println!("  api_url:    {}", config.api_url);
                println!("  socket_url: {}", config.socket_url);
                println!();
                println!("Config file: {}", Config::config_file_path().display());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", config.api_url);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message (suppressed in quiet and json modes)
    pub fn message(&self, text: &str) {
        if matches!(self.format, OutputFormat::Human) {
            println!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_is_quiet() {
        assert!(Output::new(OutputFormat::Quiet).is_quiet());
        assert!(!Output::new(OutputFormat::Human).is_quiet());
        assert!(!Output::new(OutputFormat::Json).is_quiet());
    }
}
