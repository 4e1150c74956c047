use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", ROCKET, style(step).bold());
}

/// A titled block of lines drawn with a left rail.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn text(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn bullet(mut self, line: &str) -> Self {
        self.lines.push(format!("• {}", line));
        self
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines.push(format!(
            "{:<16} {}",
            style(name).green().bold(),
            style(description).dim()
        ));
        self
    }

    pub fn render(&self) -> String {
        let rail = style("│").dim();
        let mut out = format!("\n {} {}\n", style("┌").dim(), style(&self.title).bold().cyan());
        for line in &self.lines {
            out.push_str(&format!(" {} {}\n", rail, line));
        }
        out.push_str(&format!(" {}", style("└").dim()));
        out
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}
