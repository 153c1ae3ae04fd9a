use colored::*;
use terminal_size::{terminal_size, Height, Width};

use crate::stream::{MessageKind, StreamEvent};

pub fn print_header(subtitle: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "Agency".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  🕵️ {} {}", name, version);
    println!("  {}", subtitle.cyan());

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

pub fn print_thinking(msg: &str) {
    println!("  {} {}...", "∴".magenta(), msg);
}

/// Render one stream event in the terminal.
pub fn print_event(event: &StreamEvent) {
    match event.kind {
        MessageKind::StepNumber => println!("\n{}", event.content.replace("**", "").bold()),
        MessageKind::Separator => println!("{}", "─────".black().bold()),
        MessageKind::TokenInfo => println!("  {}", strip_tags(&event.content).black().bold()),
        MessageKind::ToolStart => {
            let name = event.tool_name.as_deref().unwrap_or("tool");
            println!("  {} {}", "🛠️".cyan(), name.cyan().bold());
            for line in event.content.lines() {
                println!("    {}", line.dimmed());
            }
        }
        MessageKind::ToolContent | MessageKind::ToolResult => {
            for line in strip_tags(&event.content).lines() {
                println!("    {} {}", "│".green(), line);
            }
        }
        MessageKind::ToolError => println!("    {} {}", "💥".red(), event.content.red()),
        MessageKind::Error => print_error(&event.content),
        MessageKind::Text => {
            if event.content_type == "text" {
                println!("{}", event.content);
            } else {
                println!("  📎 {} ({})", event.content, event.content_type);
            }
        }
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
