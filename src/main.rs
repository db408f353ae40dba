#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level as TraceLevel, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::FmtSubscriber;

use window_rules::config::{startup_level, Config};
use window_rules::probe::{detect_window_properties, JsonFileProbe};
use window_rules::rules::{
    FieldSpec, ItemFilter, MatchPolicy, PolicyKind, PolicyValue, RuleFieldCatalog, RuleItem, Section, TypedValue,
};
use window_rules::x11_utils::X11Probe;
use window_rules::RuleStore;

/// Extra time allowed for the probe to answer after its delay
const DETECT_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "window-rules")]
#[command(version, about = "Manage window-matching rules for the compositor", long_about = None)]
struct Cli {
    /// Rule book to operate on (overrides config and WINDOW_RULES_FILE)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every rule with its number
    List,

    /// Show the fields of one rule
    Show {
        /// Rule number as printed by `list`
        rule: usize,

        /// Include disabled fields
        #[arg(long)]
        all: bool,

        /// Only fields whose key or name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Print every known rule field
    Catalog,

    /// Append a new rule
    New {
        #[arg(long)]
        description: Option<String>,
    },

    Remove {
        rule: usize,
    },

    /// Move a rule to another position
    Move {
        from: usize,
        to: usize,
    },

    /// Set and enable a field of a rule
    Set {
        rule: usize,
        key: String,
        value: String,

        /// Policy as a number or label (e.g. exact, force, apply-now)
        #[arg(long)]
        policy: Option<String>,
    },

    Enable {
        rule: usize,
        key: String,
    },

    Disable {
        rule: usize,
        key: String,
    },

    /// Write one rule to a standalone .winrule file
    Export {
        rule: usize,
        path: Option<PathBuf>,
    },

    /// Merge rules from a .winrule file by description
    Import {
        path: PathBuf,
    },

    /// Fill a rule's unset fields from the active window
    Detect {
        rule: usize,

        /// Seconds to wait before reading the active window
        #[arg(long)]
        delay: Option<u64>,

        /// Read the window properties from a JSON object instead of X11
        #[arg(long)]
        from_json: Option<PathBuf>,
    },
}

/// Convert a 1-based rule number into a store index
fn rule_index(store: &RuleStore, rule: usize) -> Result<usize> {
    if rule == 0 || rule > store.len() {
        anyhow::bail!("No rule {} (the rule book has {} rules)", rule, store.len());
    }
    Ok(rule - 1)
}

fn open_rule(store: &mut RuleStore, rule: usize) -> Result<usize> {
    let index = rule_index(store, rule)?;
    store.edit_rule(index);
    Ok(index)
}

fn field(key: &str) -> Result<&'static FieldSpec> {
    RuleFieldCatalog::get(key).with_context(|| format!("Unknown rule field '{}' (see `window-rules catalog`)", key))
}

fn policy_kind_name(kind: PolicyKind) -> &'static str {
    match kind {
        PolicyKind::None => "-",
        PolicyKind::StringMatch => "match",
        PolicyKind::SetPolicy => "set",
        PolicyKind::ForcePolicy => "force",
    }
}

fn print_item(item: &RuleItem) {
    let state = if item.is_enabled() { "on " } else { "off" };
    let policy = if item.policy_kind().has_policy() {
        format!(" [{}]", item.policy())
    } else {
        String::new()
    };
    println!("  {state} {:<24} {:<28} {}{policy}", item.key(), item.spec().name, item.value());
}

fn save(store: &mut RuleStore) -> Result<()> {
    store.save().context("Failed to save rule book")
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let path = cli.file.clone().unwrap_or_else(|| config.rulebook_path());
    let mut store = RuleStore::open(&path)?;
    info!(path = %path.display(), rules = store.len(), "Opened rule book");

    match cli.command {
        Command::List => {
            if store.is_empty() {
                println!("No window rules in {}", path.display());
            }
            for (index, description) in store.descriptions().iter().enumerate() {
                let warning = store.rule(index).is_some_and(|r| r.warning());
                let marker = if warning { "  (!) applies to all applications" } else { "" };
                println!("{:>3}  {description}{marker}", index + 1);
            }
        }
        Command::Show { rule, all, search } => {
            let index = rule_index(&store, rule)?;
            let Some(record) = store.rule(index) else {
                anyhow::bail!("No rule {}", rule);
            };
            println!("{}", record.description());
            if let Some(message) = record.warning_message() {
                println!("warning: {message}");
            }
            let filter = ItemFilter {
                search_text: search.unwrap_or_default(),
                show_all: all,
            };
            for item in record.visible_items(&filter) {
                print_item(item);
            }
        }
        Command::Catalog => {
            for section in [
                Section::WindowMatching,
                Section::SizeAndPosition,
                Section::ArrangementAndAccess,
                Section::AppearanceAndFixes,
            ] {
                println!("{}", section.label());
                for spec in RuleFieldCatalog::in_section(section) {
                    println!(
                        "  {:<24} {:<12} {:<6} {}",
                        spec.key,
                        spec.kind.name(),
                        policy_kind_name(spec.policy),
                        spec.name
                    );
                }
            }
        }
        Command::New { description } => {
            let index = store.new_rule();
            if let Some(description) = description {
                store.set_value("description", TypedValue::String(description));
            }
            save(&mut store)?;
            println!("Created rule {}: {}", index + 1, store.descriptions()[index]);
        }
        Command::Remove { rule } => {
            let index = rule_index(&store, rule)?;
            store.remove_rule(index);
            save(&mut store)?;
        }
        Command::Move { from, to } => {
            let source = rule_index(&store, from)?;
            let dest = rule_index(&store, to)?;
            store.move_rule(source, dest);
            save(&mut store)?;
        }
        Command::Set { rule, key, value, policy } => {
            let spec = field(&key)?;
            let index = open_rule(&mut store, rule)?;

            if TypedValue::String(value.clone()).coerce(spec.kind).is_none() {
                anyhow::bail!("'{}' is not a valid {} value for {}", value, spec.kind.name(), key);
            }
            store.set_value(&key, TypedValue::String(value));
            store.set_enabled(&key, true);

            if let Some(policy) = policy {
                let Some(parsed) = spec.policy.parse(&policy) else {
                    let options: Vec<&str> = spec.policy.options().iter().map(|p| p.label()).collect();
                    anyhow::bail!("Policy '{}' is not valid for {} (expected one of {:?})", policy, key, options);
                };
                store.set_policy(&key, parsed);
            } else if spec.policy == PolicyKind::StringMatch
                && store
                    .rule(index)
                    .and_then(|record| record.item(&key))
                    .is_some_and(|item| item.policy() == PolicyValue::Match(MatchPolicy::Unimportant))
            {
                // Unimportant is not stored, so the value would be dropped on save
                store.set_policy(&key, PolicyValue::Match(MatchPolicy::Exact));
            }
            save(&mut store)?;
        }
        Command::Enable { rule, key } => {
            field(&key)?;
            open_rule(&mut store, rule)?;
            store.set_enabled(&key, true);
            save(&mut store)?;
        }
        Command::Disable { rule, key } => {
            field(&key)?;
            open_rule(&mut store, rule)?;
            if !store.set_enabled(&key, false) {
                warn!(key = %key, "Field is already disabled or cannot be disabled");
            }
            save(&mut store)?;
        }
        Command::Export { rule, path } => {
            let index = rule_index(&store, rule)?;
            let target = match path {
                Some(path) => path,
                None => store
                    .default_export_path(index, &config.export_dir())
                    .context("Rule disappeared before export")?,
            };
            store.export_rule(index, &target)?;
            println!("Exported rule {} to {}", rule, target.display());
        }
        Command::Import { path } => {
            let applied = store.import_rules(&path)?;
            save(&mut store)?;
            println!("Imported {} rule(s) from {}", applied, path.display());
        }
        Command::Detect { rule, delay, from_json } => {
            open_rule(&mut store, rule)?;
            let delay = delay.map(Duration::from_secs).unwrap_or_else(|| config.detect_delay());

            let (tx, rx) = mpsc::channel();
            let request = match from_json {
                Some(json) => detect_window_properties(JsonFileProbe::new(json), delay, tx)?,
                None => {
                    println!("Focus the window to inspect within {}s...", delay.as_secs());
                    detect_window_properties(X11Probe::default(), delay, tx)?
                }
            };

            let bag = rx.recv_timeout(delay + DETECT_GRACE);
            request.cancel();
            request.join();
            let bag = bag.context("No window properties were detected")?;

            let written = store.apply_window_properties(&bag);
            save(&mut store)?;
            println!("Filled {} field(s) of rule {}", written, rule);
        }
    }
    Ok(())
}

type SetLevel = Box<dyn Fn(TraceLevel) -> Result<()>>;

/// Subscriber whose max level can be changed once the config is known
fn build_subscriber<W>(level: TraceLevel, writer: W) -> (impl Subscriber + Send + Sync + 'static, SetLevel)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(writer)
        .with_filter_reloading();
    let handle = builder.reload_handle();
    let set_level: SetLevel = Box::new(move |level| handle.reload(level).context("Failed to change log level"));
    (builder.finish(), set_level)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (subscriber, set_level) = build_subscriber(startup_level(), std::io::stderr);
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load().context("Failed to load configuration")?;
    set_level(config.level())?;

    run(cli, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_config_warnings_are_logged_before_level_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"error\"\ndetect_delay_secs = 600\n").unwrap();

        let captured = Captured::default();
        let sink = captured.clone();
        let (subscriber, set_level) = build_subscriber(TraceLevel::INFO, move || sink.clone());

        tracing::subscriber::with_default(subscriber, || {
            let config = Config::load_from(&path).unwrap();
            set_level(config.level()).unwrap();
            warn!("logged after switching to the configured level");
        });

        let text = captured.text();
        assert!(text.contains("detect_delay_secs exceeds maximum"));
        assert!(!text.contains("logged after switching"));
    }
}
