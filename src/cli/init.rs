//! Project configuration scaffolding

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use console::Term;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::utils::is_filesystem_safe;

const CONFIG_TEMPLATE: &str = include_str!("../../template/webpack.config.toml");

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([a-z_]+)\}\}").unwrap());

static SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)# \{\{#([a-z-]+)\}\}\n(.*?)# \{\{/[a-z-]+\}\}\n").unwrap()
});

/// Kind of project the configuration is generated for
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    /// Static pages served by the dev server
    HtmlSpa,
    /// Pages rendered by a Node server, assets from the dev server
    NodeSpa,
    /// Node server rendering with a server bundle
    NodeSsr,
}

impl ProjectKind {
    fn name(&self) -> &'static str {
        match self {
            ProjectKind::HtmlSpa => "html-spa",
            ProjectKind::NodeSpa => "node-spa",
            ProjectKind::NodeSsr => "node-ssr",
        }
    }
}

/// Generate a project configuration file
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project type
    #[arg(long = "type", value_enum)]
    pub kind: Option<ProjectKind>,

    /// Dev server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Name of the first entry
    #[arg(long)]
    pub entry_name: Option<String>,

    /// Module of the first entry
    #[arg(long)]
    pub entry_path: Option<String>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Answers the configuration is rendered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAnswers {
    pub kind: ProjectKind,
    pub port: u16,
    pub entry_name: String,
    pub entry_path: String,
}

impl Default for InitAnswers {
    fn default() -> Self {
        Self {
            kind: ProjectKind::HtmlSpa,
            port: 8080,
            entry_name: "main".to_string(),
            entry_path: "./src/index.js".to_string(),
        }
    }
}

impl InitCommand {
    pub async fn execute(&self, root: &Path) -> Result<()> {
        let target = root.join(DEFAULT_CONFIG_PATH);
        if target.exists() && !self.force {
            bail!(
                "{} already exists, pass --force to overwrite it",
                target.display()
            );
        }

        let answers = self.answers()?;
        if !is_filesystem_safe(&answers.entry_name) {
            bail!("Entry name '{}' is not a safe file name", answers.entry_name);
        }

        eprintln!(
            "{} Generating configuration for a {} project...\n",
            "→".blue(),
            answers.kind.name().cyan()
        );

        fs::write(&target, render(&answers))
            .with_context(|| format!("Failed to write {}", target.display()))?;
        eprintln!("  {} Created {}", "✓".green(), "webpack.config.toml".cyan());

        eprintln!("\n  Next steps:");
        eprintln!("    {} mixpack dev", "→".dimmed());
        eprintln!();

        Ok(())
    }

    /// Flags first, then prompts on a terminal, then defaults
    fn answers(&self) -> Result<InitAnswers> {
        let defaults = InitAnswers::default();
        let term = Term::stderr();
        let interactive = console::user_attended_stderr() && console::user_attended();

        let kind = match self.kind {
            Some(kind) => kind,
            None if interactive => ask_kind(&term, defaults.kind)?,
            None => defaults.kind,
        };
        let port = match self.port {
            Some(port) => port,
            None if interactive => ask_port(&term, defaults.port)?,
            None => defaults.port,
        };
        let entry_name = match &self.entry_name {
            Some(name) => name.clone(),
            None if interactive => ask(&term, "Entry name?", &defaults.entry_name)?,
            None => defaults.entry_name,
        };
        let entry_path = match &self.entry_path {
            Some(path) => path.clone(),
            None if interactive => ask(&term, "Entry module path?", &defaults.entry_path)?,
            None => defaults.entry_path,
        };

        Ok(InitAnswers {
            kind,
            port,
            entry_name,
            entry_path,
        })
    }
}

fn ask(term: &Term, question: &str, default: &str) -> Result<String> {
    term.write_str(&format!(
        "{} {} {} ",
        "?".green().bold(),
        question,
        format!("({})", default).dimmed()
    ))?;
    let answer = term.read_line()?;
    let answer = answer.trim();

    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

fn ask_kind(term: &Term, default: ProjectKind) -> Result<ProjectKind> {
    let choices: Vec<&str> = ProjectKind::value_variants().iter().map(|k| k.name()).collect();
    let question = format!("Project type [{}]?", choices.join(", "));
    loop {
        let answer = ask(term, &question, default.name())?;
        match ProjectKind::from_str(&answer, true) {
            Ok(kind) => return Ok(kind),
            Err(_) => term.write_line(&format!(
                "  {} choose one of {}",
                "!".yellow(),
                choices.join(", ")
            ))?,
        }
    }
}

fn ask_port(term: &Term, default: u16) -> Result<u16> {
    loop {
        let answer = ask(term, "Dev server port?", &default.to_string())?;
        match answer.parse() {
            Ok(port) => return Ok(port),
            Err(_) => term.write_line(&format!(
                "  {} '{}' is not a port number",
                "!".yellow(),
                answer
            ))?,
        }
    }
}

/// Render the configuration template for `answers`
pub fn render(answers: &InitAnswers) -> String {
    let kind = answers.kind.name();

    let with_sections = SECTION.replace_all(CONFIG_TEMPLATE, |caps: &Captures| {
        if &caps[1] == kind {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    let dev_path = match answers.kind {
        ProjectKind::HtmlSpa => "/".to_string(),
        // Pages come from the Node server, assets from the dev server
        ProjectKind::NodeSpa | ProjectKind::NodeSsr => {
            format!("http://127.0.0.1:{}/", answers.port)
        }
    };

    let values: HashMap<&str, String> = HashMap::from([
        ("type", kind.to_string()),
        ("port", answers.port.to_string()),
        ("entry_name", toml_string(&answers.entry_name)),
        ("entry_path", toml_string(&answers.entry_path)),
        ("server_entry_path", toml_string("./src/server.js")),
        ("dev_path", toml_string(&dev_path)),
        ("use_temp_path", (answers.kind == ProjectKind::NodeSsr).to_string()),
    ]);

    PLACEHOLDER
        .replace_all(&with_sections, |caps: &Captures| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// A quoted, escaped TOML string
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryValue, PartialSettings, ProjectSettings};

    fn parse(rendered: &str) -> ProjectSettings {
        ProjectSettings::merged(toml::from_str::<PartialSettings>(rendered).unwrap())
    }

    #[test]
    fn test_render_defaults_parse() {
        let rendered = render(&InitAnswers::default());
        assert!(!rendered.contains("{{"));

        let settings = parse(&rendered);
        assert_eq!(settings.dev_server.port, Some(8080));
        assert!(settings.dev_server.hot);
        assert_eq!(settings.dev_path, "/");
        assert!(!settings.use_temp_path);
        assert_eq!(
            settings.entry["main"],
            EntryValue::Single("./src/index.js".to_string())
        );
        assert!(settings.node_server_entry.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_render_node_ssr() {
        let rendered = render(&InitAnswers {
            kind: ProjectKind::NodeSsr,
            port: 9000,
            entry_name: "home".to_string(),
            entry_path: "./src/home.js".to_string(),
        });
        let settings = parse(&rendered);

        assert_eq!(settings.dev_server.port, Some(9000));
        assert_eq!(settings.dev_path, "http://127.0.0.1:9000/");
        assert!(settings.use_temp_path);
        assert_eq!(
            settings.node_server_entry["home"],
            EntryValue::Single("./src/server.js".to_string())
        );
    }

    #[test]
    fn test_render_escapes_values() {
        let rendered = render(&InitAnswers {
            entry_path: r#"./src/"quoted".js"#.to_string(),
            ..InitAnswers::default()
        });
        let settings = parse(&rendered);
        assert_eq!(
            settings.entry["main"],
            EntryValue::Single(r#"./src/"quoted".js"#.to_string())
        );
    }
}
