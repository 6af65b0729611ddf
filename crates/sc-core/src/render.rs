//! Presentation of client lists and dispatch outcomes.
//!
//! Every function returns the full payload for stdout. Machine formats wrap
//! results in the usual `schema_version` / `generated_at` envelope.

use sc_common::{OutputFormat, SCHEMA_VERSION};
use serde_json::{json, Value};

use crate::dispatch::{CompileStatus, DispatchResult};
use crate::registry::{RefreshReport, TrackedClient};

fn envelope(kind: &str, body: Value) -> Value {
    let mut obj = json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "kind": kind,
    });
    if let (Some(target), Value::Object(fields)) = (obj.as_object_mut(), body) {
        target.extend(fields);
    }
    obj
}

fn client_json(client: &TrackedClient) -> Value {
    json!({
        "id": client.id(),
        "name": client.name(),
        "label": client.display_label(),
        "selected": client.selected,
    })
}

fn checkbox(selected: bool) -> &'static str {
    if selected {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Render the tracked client list.
pub fn render_clients(clients: &[TrackedClient], format: OutputFormat) -> String {
    let selected = clients.iter().filter(|c| c.selected).count();
    match format {
        OutputFormat::Json => {
            let doc = envelope(
                "clients",
                json!({
                    "total": clients.len(),
                    "selected": selected,
                    "clients": clients.iter().map(client_json).collect::<Vec<_>>(),
                }),
            );
            serde_json::to_string_pretty(&doc).unwrap_or_default()
        }
        OutputFormat::Jsonl => clients
            .iter()
            .map(|c| client_json(c).to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Summary => {
            format!("{} clients, {} selected", clients.len(), selected)
        }
        OutputFormat::Md => {
            let mut out = String::from("# Clients\n\n| | Client | Id |\n|---|---|---|\n");
            for c in clients {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    checkbox(c.selected),
                    c.name().replace('|', "\\|"),
                    c.id()
                ));
            }
            out.push_str(&format!(
                "\n{} clients, {} selected\n",
                clients.len(),
                selected
            ));
            out
        }
        OutputFormat::Human => {
            if clients.is_empty() {
                return "No clients.".to_string();
            }
            clients
                .iter()
                .map(|c| format!("{} {}", checkbox(c.selected), c.display_label()))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Render a validator verdict.
pub fn render_compile_status(status: &CompileStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let body = match status {
                CompileStatus::Success => json!({ "status": "success" }),
                CompileStatus::CompileError { message } => {
                    json!({ "status": "compile_error", "message": message })
                }
            };
            let doc = envelope("check", body);
            if format == OutputFormat::Json {
                serde_json::to_string_pretty(&doc).unwrap_or_default()
            } else {
                doc.to_string()
            }
        }
        OutputFormat::Summary => match status {
            CompileStatus::Success => "compile: ok".to_string(),
            CompileStatus::CompileError { .. } => "compile: error".to_string(),
        },
        OutputFormat::Md => match status {
            CompileStatus::Success => "# Check\n\n✓ Script compiles\n".to_string(),
            CompileStatus::CompileError { message } => {
                format!("# Check\n\n✗ Compiler Error\n\n```\n{}\n```\n", message)
            }
        },
        OutputFormat::Human => match status {
            CompileStatus::Success => "✓ Script compiles".to_string(),
            // The diagnostic is shown exactly as the validator wrote it.
            CompileStatus::CompileError { message } => format!("✗ Compiler Error\n{}", message),
        },
    }
}

/// Render a dispatch outcome.
pub fn render_dispatch(result: &DispatchResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let body = match result {
                DispatchResult::Sent { targets } => json!({
                    "outcome": "sent",
                    "target_count": targets.len(),
                    "targets": targets,
                }),
                DispatchResult::Rejected { diagnostic } => json!({
                    "outcome": "rejected",
                    "diagnostic": diagnostic,
                }),
            };
            let doc = envelope("dispatch", body);
            if format == OutputFormat::Json {
                serde_json::to_string_pretty(&doc).unwrap_or_default()
            } else {
                doc.to_string()
            }
        }
        OutputFormat::Summary => match result {
            DispatchResult::Sent { targets } => format!("sent to {} clients", targets.len()),
            DispatchResult::Rejected { .. } => "rejected".to_string(),
        },
        OutputFormat::Md => match result {
            DispatchResult::Sent { targets } => {
                let mut out = format!("# Dispatch\n\nSent to {} clients\n\n", targets.len());
                for t in targets {
                    out.push_str(&format!("- {}\n", t));
                }
                out
            }
            DispatchResult::Rejected { diagnostic } => {
                format!("# Dispatch\n\n✗ Compiler Error\n\n```\n{}\n```\n", diagnostic)
            }
        },
        OutputFormat::Human => match result {
            DispatchResult::Sent { targets } if targets.is_empty() => {
                "✓ Sent (no clients selected)".to_string()
            }
            DispatchResult::Sent { targets } => {
                format!("✓ Sent to {}: {}", targets.len(), targets.join(", "))
            }
            DispatchResult::Rejected { diagnostic } => format!("✗ Compiler Error\n{}", diagnostic),
        },
    }
}

/// One-line note about a membership change, for the console.
pub fn render_refresh(report: &RefreshReport) -> Option<String> {
    if report.is_unchanged() {
        return None;
    }
    let ids = |list: &[sc_common::ClientId]| {
        list.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut parts = Vec::new();
    if !report.added.is_empty() {
        parts.push(format!("+{} ({})", report.added.len(), ids(&report.added)));
    }
    if !report.removed.is_empty() {
        parts.push(format!("-{} ({})", report.removed.len(), ids(&report.removed)));
    }
    Some(format!("clients changed: {}", parts.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClientRegistry;
    use sc_common::{ClientId, ClientRecord};

    fn registry() -> ClientRegistry {
        let mut registry = ClientRegistry::new();
        registry.refresh(&[ClientRecord::new(1, "alice"), ClientRecord::new(2, "bob")]);
        registry.set_selected(ClientId(2), false).unwrap();
        registry
    }

    #[test]
    fn human_clients_use_display_label() {
        let reg = registry();
        let text = render_clients(reg.clients(), OutputFormat::Human);
        assert_eq!(text, "[x] alice, PID: 1\n[ ] bob, PID: 2");
        assert_eq!(render_clients(&[], OutputFormat::Human), "No clients.");
    }

    #[test]
    fn json_clients_carry_envelope() {
        let reg = registry();
        let text = render_clients(reg.clients(), OutputFormat::Json);
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["schema_version"], SCHEMA_VERSION);
        assert_eq!(doc["kind"], "clients");
        assert_eq!(doc["total"], 2);
        assert_eq!(doc["selected"], 1);
        assert_eq!(doc["clients"][1]["id"], 2);
        assert_eq!(doc["clients"][1]["selected"], false);
    }

    #[test]
    fn jsonl_clients_one_per_line() {
        let reg = registry();
        let text = render_clients(reg.clients(), OutputFormat::Jsonl);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["label"], "alice, PID: 1");
    }

    #[test]
    fn summary_counts() {
        let reg = registry();
        assert_eq!(
            render_clients(reg.clients(), OutputFormat::Summary),
            "2 clients, 1 selected"
        );
    }

    #[test]
    fn compile_error_is_verbatim() {
        let status = CompileStatus::CompileError {
            message: "[string \"x\"]:1: syntax error near 'end'".into(),
        };
        assert_eq!(
            render_compile_status(&status, OutputFormat::Human),
            "✗ Compiler Error\n[string \"x\"]:1: syntax error near 'end'"
        );
        let doc: Value =
            serde_json::from_str(&render_compile_status(&status, OutputFormat::Json)).unwrap();
        assert_eq!(doc["status"], "compile_error");
        assert_eq!(doc["message"], "[string \"x\"]:1: syntax error near 'end'");
    }

    #[test]
    fn dispatch_rendering() {
        let sent = DispatchResult::Sent {
            targets: vec!["alice".into(), "bob".into()],
        };
        assert_eq!(
            render_dispatch(&sent, OutputFormat::Human),
            "✓ Sent to 2: alice, bob"
        );
        assert_eq!(
            render_dispatch(&sent, OutputFormat::Summary),
            "sent to 2 clients"
        );

        let empty = DispatchResult::Sent { targets: vec![] };
        assert_eq!(
            render_dispatch(&empty, OutputFormat::Human),
            "✓ Sent (no clients selected)"
        );

        let doc: Value =
            serde_json::from_str(&render_dispatch(&sent, OutputFormat::Jsonl)).unwrap();
        assert_eq!(doc["outcome"], "sent");
        assert_eq!(doc["target_count"], 2);
    }

    #[test]
    fn refresh_note_only_on_change() {
        assert!(render_refresh(&RefreshReport::default()).is_none());
        let report = RefreshReport {
            added: vec![ClientId(3)],
            removed: vec![ClientId(1), ClientId(2)],
            skipped_blank: 0,
        };
        assert_eq!(
            render_refresh(&report).unwrap(),
            "clients changed: +1 (3) -2 (1, 2)"
        );
    }
}
