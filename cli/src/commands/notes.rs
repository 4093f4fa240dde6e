//! NOTES commands - list, read and edit notes.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{HumanReadable, format_timestamp, make_empty_request, make_request, output, truncate};

#[derive(Args)]
pub struct NotesArgs {
    #[command(subcommand)]
    pub command: NotesCommand,
}

#[derive(Subcommand)]
pub enum NotesCommand {
    /// List notes, newest first
    List {
        /// Only notes with an id below this cursor
        #[arg(long)]
        cursor: Option<i64>,

        /// Page size (1-100)
        #[arg(long, short = 'l')]
        limit: Option<u32>,

        /// Follow `nextCursor` until every page is fetched
        #[arg(long)]
        all: bool,
    },

    /// Show a single note
    Get { id: i64 },

    /// Create a note
    Create { msg: String },

    /// Replace a note's message
    Update { id: i64, msg: String },

    /// Delete a note (admin only)
    Delete { id: i64 },
}

#[derive(Serialize)]
struct NoteBody<'a> {
    msg: &'a str,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Note {
    pub id: i64,
    pub msg: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NotePage {
    pub items: Vec<Note>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<i64>,
}

impl HumanReadable for Note {
    fn print_human(&self) {
        println!("{} {}", "Note".green().bold(), self.id.to_string().bold());
        println!();
        println!("  {} {}", "Created:".cyan(), format_timestamp(&self.created_at));
        println!();
        println!("{}", self.msg);
    }
}

impl HumanReadable for NotePage {
    fn print_human(&self) {
        if self.items.is_empty() {
            println!("  {}", "(No notes)".dimmed());
            return;
        }

        for note in &self.items {
            println!(
                "  {:>6}  {}  {}",
                note.id.to_string().bold(),
                format_timestamp(&note.created_at).dimmed(),
                truncate(&note.msg, 60)
            );
        }

        println!();
        println!("  {} {}", "Shown:".cyan(), self.items.len());
        if let Some(cursor) = self.next_cursor {
            println!("  {} --cursor {}", "More:".cyan(), cursor);
        }
    }
}

fn page_url(base_url: &str, cursor: Option<i64>, limit: Option<u32>) -> String {
    let mut params = Vec::new();
    if let Some(cursor) = cursor {
        params.push(format!("cursor={cursor}"));
    }
    if let Some(limit) = limit {
        params.push(format!("limit={limit}"));
    }

    if params.is_empty() {
        format!("{}/v1/notes", base_url)
    } else {
        format!("{}/v1/notes?{}", base_url, params.join("&"))
    }
}

/// Execute a notes subcommand.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: NotesArgs,
) -> Result<()> {
    match args.command {
        NotesCommand::List { cursor, limit, all } => {
            let mut page: NotePage = make_request(client.get(page_url(base_url, cursor, limit))).await?;
            if all {
                let mut items = std::mem::take(&mut page.items);
                while let Some(next) = page.next_cursor {
                    page = make_request(client.get(page_url(base_url, Some(next), limit))).await?;
                    items.append(&mut page.items);
                }
                page.items = items;
            }
            output(&page, human)
        }
        NotesCommand::Get { id } => {
            let note: Note = make_request(client.get(format!("{}/v1/notes/{}", base_url, id))).await?;
            output(&note, human)
        }
        NotesCommand::Create { msg } => {
            if msg.trim().is_empty() {
                bail!("message must not be empty");
            }
            let note: Note = make_request(
                client
                    .post(format!("{}/v1/notes", base_url))
                    .json(&NoteBody { msg: &msg }),
            )
            .await?;
            output(&note, human)
        }
        NotesCommand::Update { id, msg } => {
            let note: Note = make_request(
                client
                    .patch(format!("{}/v1/notes/{}", base_url, id))
                    .json(&NoteBody { msg: &msg }),
            )
            .await?;
            output(&note, human)
        }
        NotesCommand::Delete { id } => {
            make_empty_request(client.delete(format!("{}/v1/notes/{}", base_url, id))).await?;
            if human {
                println!("{} {}", "Deleted note".green().bold(), id);
            } else {
                println!("{}", serde_json::json!({ "id": id, "deleted": true }));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        assert_eq!(page_url("http://h", None, None), "http://h/v1/notes");
        assert_eq!(page_url("http://h", Some(9), None), "http://h/v1/notes?cursor=9");
        assert_eq!(
            page_url("http://h", Some(9), Some(20)),
            "http://h/v1/notes?cursor=9&limit=20"
        );
    }

    #[test]
    fn test_page_decodes_server_shape() {
        let json = r#"{"items":[{"id":3,"msg":"hi","created_at":"2024-01-01T00:00:00Z"}],"nextCursor":null}"#;
        let page: NotePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items[0].id, 3);
        assert!(page.next_cursor.is_none());
    }
}
