use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mood::commands::{Command, CommandOutcome, Editor, EditorHost, MoodEnergy, Presenter};
use mood::core::MenuEntry;
use mood::format_outline;
use mood::navigation::{MoodNavigator, Selection};
use mood::parse_moods;
use mood::projectors::output_projector::{energy_output, mood_and_energy_output, mood_output};
use mood::settings::{
    EnergyDisplay, JsonFileStore, Settings, SettingsPatch, load_settings, save_settings,
};
use mood::storage::{FsVault, Vault, suggest_paths};

#[derive(Debug, Parser)]
#[command(
    name = "mood",
    about = "Mood and energy logging built on the mood crate",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse a moods file and print its sections and moods.
    Tree(TreeArgs),

    /// Render an energy value as a bar.
    Bar(BarArgs),

    /// Compose the text a command would insert.
    Render(RenderArgs),

    /// Run an insert command interactively; the inserted text goes to stdout.
    Pick(PickArgs),

    /// Suggest vault files matching a query.
    Suggest(SuggestArgs),

    /// Show or update the settings file.
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Moods file to parse.
    file: PathBuf,
    /// Emit JSON instead of an outline.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct BarArgs {
    /// Energy value; clamped to 0-100.
    #[arg(allow_hyphen_values = true)]
    value: i64,
    /// Glyphs from full to empty. Defaults to the configured palette.
    #[arg(long)]
    icons: Option<String>,
    /// Number of glyphs. Defaults to the configured count.
    #[arg(long, allow_hyphen_values = true)]
    count: Option<i64>,
    /// Settings JSON file.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Settings JSON file.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    mood: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    energy: Option<i64>,
    /// Override the configured energy display.
    #[arg(long, value_enum)]
    display: Option<DisplayArg>,
}

#[derive(Debug, Args)]
struct PickArgs {
    /// Settings JSON file.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Vault root the moods file path is resolved against.
    #[arg(long, default_value = ".")]
    vault: PathBuf,
    /// Command id to run.
    #[arg(long, default_value = "insert-mood-and-energy")]
    command: Command,
}

#[derive(Debug, Args)]
struct SuggestArgs {
    query: String,
    /// Vault root to search.
    #[arg(long, default_value = ".")]
    vault: PathBuf,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// Settings JSON file.
    #[arg(long, default_value = "data.json")]
    file: PathBuf,
    #[arg(long)]
    moods_file: Option<String>,
    #[arg(long, value_enum)]
    display: Option<DisplayArg>,
    #[arg(long)]
    bar_icons: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    bar_icon_count: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DisplayArg {
    Text,
    Percent,
    Bar,
}

impl From<DisplayArg> for EnergyDisplay {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::Text => EnergyDisplay::Text,
            DisplayArg::Percent => EnergyDisplay::Percent,
            DisplayArg::Bar => EnergyDisplay::Bar,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    match cli.command {
        Commands::Tree(args) => handle_tree(args, verbose),
        Commands::Bar(args) => handle_bar(args),
        Commands::Render(args) => handle_render(args),
        Commands::Pick(args) => handle_pick(args, verbose),
        Commands::Suggest(args) => handle_suggest(args),
        Commands::Settings(args) => handle_settings(args),
    }
}

fn read_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => load_settings(&JsonFileStore::new(path)),
        None => Settings::default(),
    }
}

fn handle_tree(args: TreeArgs, verbose: bool) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let tree = parse_moods(&text);
    if verbose {
        eprintln!(
            "Parsed {} section(s), {} mood(s) from {}",
            tree.len() - 1,
            tree.all_moods().len(),
            args.file.display()
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", format_outline(&tree));
    }
    Ok(())
}

fn handle_bar(args: BarArgs) -> Result<()> {
    let settings = read_settings(args.settings.as_deref());
    let icons = args.icons.unwrap_or(settings.bar_icons);
    let count = args.count.unwrap_or(settings.bar_icon_count);
    println!("{}", mood::format_bar(&icons, args.value, count));
    Ok(())
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let mut settings = read_settings(args.settings.as_deref());
    if let Some(display) = args.display {
        settings.energy_display = display.into();
    }
    println!("{}", compose(&settings, args.mood.as_deref(), args.energy)?);
    Ok(())
}

fn compose(settings: &Settings, mood: Option<&str>, energy: Option<i64>) -> Result<String> {
    Ok(match (mood, energy) {
        (Some(mood), Some(energy)) => mood_and_energy_output(settings, mood, energy),
        (Some(mood), None) => mood_output(settings, mood),
        (None, Some(energy)) => energy_output(settings, energy),
        (None, None) => anyhow::bail!("Nothing to render: pass --mood and/or --energy"),
    })
}

fn handle_pick(args: PickArgs, verbose: bool) -> Result<()> {
    let settings = read_settings(args.settings.as_deref());
    if verbose {
        eprintln!(
            "Running {} with moods from {}",
            args.command.id(),
            args.vault.join(&settings.moods_file_path).display()
        );
    }

    let mut app = MoodEnergy::new(settings, FsVault::new(&args.vault));
    let stdin = io::stdin();
    let mut presenter = TerminalPresenter::new(stdin.lock(), io::stderr());
    let mut host = TerminalHost::new(io::stdout());

    match app.run(args.command, &mut presenter, &mut host) {
        CommandOutcome::Inserted(_) => Ok(()),
        CommandOutcome::Cancelled => {
            eprintln!("Cancelled.");
            Ok(())
        }
        CommandOutcome::NoEditor => anyhow::bail!("No editor to insert into"),
        CommandOutcome::Busy => anyhow::bail!("Another selection is already open"),
    }
}

fn handle_suggest(args: SuggestArgs) -> Result<()> {
    let files = FsVault::new(&args.vault)
        .list_files()
        .with_context(|| format!("Failed to list {}", args.vault.display()))?;
    for path in suggest_paths(&files, &args.query) {
        println!("{path}");
    }
    Ok(())
}

fn handle_settings(args: SettingsArgs) -> Result<()> {
    let store = JsonFileStore::new(&args.file);
    let mut settings = load_settings(&store);
    let changed = apply_settings_changes(&mut settings, &args)?;
    if changed {
        save_settings(&store, &settings)
            .with_context(|| format!("Failed to save {}", args.file.display()))?;
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn apply_settings_changes(settings: &mut Settings, args: &SettingsArgs) -> Result<bool> {
    let patch = SettingsPatch {
        moods_file_path: args.moods_file.clone(),
        energy_display: args.display.map(|d| EnergyDisplay::from(d).to_string()),
        bar_icons: args.bar_icons.clone(),
        bar_icon_count: args.bar_icon_count.clone(),
    };
    settings
        .apply(&patch)
        .context("Rejected settings change")
}

/* ---------------------------- Terminal hosts ---------------------------- */

/// Line-based selection: numbered or named entries, `b` to go back, `q` to quit.
struct TerminalPresenter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// `None` at end of input.
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn mood_menu(&mut self, mut nav: MoodNavigator<'_>) -> io::Result<Selection<String>> {
        loop {
            let entries = nav.entries();
            let crumb = nav.breadcrumb();
            if crumb.is_empty() {
                writeln!(self.output, "Moods")?;
            } else {
                writeln!(self.output, "{}", crumb.join(" / "))?;
            }
            if entries.is_empty() {
                writeln!(self.output, "  (no moods)")?;
            }

            let mut choices = Vec::new();
            for entry in &entries {
                match entry {
                    MenuEntry::Separator => writeln!(self.output, "  ---")?,
                    MenuEntry::Section { name, .. } => {
                        choices.push(entry);
                        writeln!(self.output, "  {}. {name} >", choices.len())?;
                    }
                    MenuEntry::Mood { name } => {
                        choices.push(entry);
                        writeln!(self.output, "  {}. {name}", choices.len())?;
                    }
                }
            }

            let Some(answer) = self.prompt("number or name, b = back, q = quit> ")? else {
                return Ok(Selection::Cancelled);
            };
            match answer.as_str() {
                "q" => return Ok(Selection::Cancelled),
                "b" | "" => {
                    if let Some(selection) = nav.escape() {
                        return Ok(selection);
                    }
                }
                other => match other.parse::<usize>() {
                    Ok(n) => {
                        let picked = n.checked_sub(1).and_then(|i| choices.get(i).copied());
                        match picked {
                            Some(entry) => match nav.activate(entry) {
                                Ok(Some(selection)) => return Ok(selection),
                                Ok(None) => {}
                                Err(err) => writeln!(self.output, "{err}")?,
                            },
                            None => writeln!(self.output, "No entry {other:?}")?,
                        }
                    }
                    Err(_) => match nav.activate_label(other) {
                        Ok(Some(selection)) => return Ok(selection),
                        Ok(None) => {}
                        Err(err) => writeln!(self.output, "{err}")?,
                    },
                },
            }
        }
    }

    fn energy_prompt(&mut self, settings: &Settings, initial: u8) -> io::Result<Selection<u8>> {
        loop {
            let Some(answer) = self.prompt(&format!("energy 0-100 [{initial}], q = quit> "))? else {
                return Ok(Selection::Cancelled);
            };
            let value = match answer.as_str() {
                "q" => return Ok(Selection::Cancelled),
                "" => initial,
                other => match other.parse::<u8>() {
                    Ok(v) if v <= 100 => v,
                    _ => {
                        writeln!(self.output, "Enter a whole number from 0 to 100")?;
                        continue;
                    }
                },
            };
            writeln!(self.output, "{}", energy_output(settings, i64::from(value)))?;
            return Ok(Selection::Confirmed(value));
        }
    }
}

fn cancel_on_io_error<T>(result: io::Result<Selection<T>>) -> Selection<T> {
    result.unwrap_or_else(|err| {
        log::warn!("terminal I/O failed: {err}");
        Selection::Cancelled
    })
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn choose_mood(&mut self, navigator: MoodNavigator<'_>) -> Selection<String> {
        cancel_on_io_error(self.mood_menu(navigator))
    }

    fn choose_energy(&mut self, settings: &Settings, initial: u8) -> Selection<u8> {
        cancel_on_io_error(self.energy_prompt(settings, initial))
    }

    fn choose_mood_and_energy(
        &mut self,
        navigator: MoodNavigator<'_>,
        settings: &Settings,
        initial: u8,
    ) -> Selection<(String, u8)> {
        let Selection::Confirmed(mood) = self.choose_mood(navigator) else {
            return Selection::Cancelled;
        };
        self.choose_energy(settings, initial).map(|value| (mood, value))
    }
}

/// Writes each insertion as a line.
struct LineEditor<W> {
    out: W,
}

impl<W: Write> Editor for LineEditor<W> {
    fn focus(&mut self) {}

    fn replace_selection(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            log::warn!("failed to write insertion: {err}");
        }
    }
}

struct TerminalHost<W> {
    editor: LineEditor<W>,
}

impl<W: Write> TerminalHost<W> {
    fn new(out: W) -> Self {
        Self {
            editor: LineEditor { out },
        }
    }
}

impl<W: Write> EditorHost for TerminalHost<W> {
    fn active_editor(&mut self) -> Option<&mut dyn Editor> {
        Some(&mut self.editor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mood::storage::load_mood_tree;
    use std::io::Cursor;

    const MOODS: &str = "---\ntitle: moods\n---\n# Work\n- Focused\n- Tired\n## Deep\n- Flow\n# Home\n- Relaxed\n";

    fn presenter(input: &str) -> TerminalPresenter<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPresenter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn fhe_settings() -> Settings {
        Settings {
            bar_icons: "FHE".into(),
            bar_icon_count: 3,
            ..Settings::default()
        }
    }

    fn vault_with_moods() -> (tempfile::TempDir, FsVault) {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("moods.txt"), MOODS).expect("write moods");
        let vault = FsVault::new(tmp.path());
        (tmp, vault)
    }

    #[test]
    fn terminal_menu_drills_down_and_picks() {
        let tree = parse_moods(MOODS);
        // Root lists Home, Work; Work lists Deep, ---, Focused, Tired.
        let mut p = presenter("2\n2\n");
        let picked = p.choose_mood(MoodNavigator::new(&tree));
        assert_eq!(picked, Selection::Confirmed("Focused".to_string()));

        let shown = String::from_utf8(p.output).expect("utf8");
        assert!(shown.contains("Work\n"));
        assert!(shown.contains("  1. Deep >"));
        assert!(shown.contains("  ---"));
    }

    #[test]
    fn terminal_menu_back_then_quit() {
        let tree = parse_moods(MOODS);
        let mut p = presenter("1\nb\nb\n");
        assert_eq!(p.choose_mood(MoodNavigator::new(&tree)), Selection::Cancelled);

        let mut p = presenter("9\nx\n");
        assert_eq!(p.choose_mood(MoodNavigator::new(&tree)), Selection::Cancelled);
        let shown = String::from_utf8(p.output).expect("utf8");
        assert!(shown.contains("No entry \"9\""));
    }

    #[test]
    fn terminal_menu_accepts_typed_names() {
        let tree = parse_moods(MOODS);
        let mut p = presenter("home
sleepy
relaxed
");
        assert_eq!(
            p.choose_mood(MoodNavigator::new(&tree)),
            Selection::Confirmed("Relaxed".to_string())
        );
        let shown = String::from_utf8(p.output).expect("utf8");
        assert!(shown.contains("no entry named \"sleepy\""));
    }

    #[test]
    fn terminal_energy_uses_default_and_validates() {
        let settings = fhe_settings();
        let mut p = presenter("\n");
        assert_eq!(p.choose_energy(&settings, 50), Selection::Confirmed(50));
        assert!(String::from_utf8(p.output).expect("utf8").contains("Energy: FHE"));

        let mut p = presenter("150\nabc\n60\n");
        assert_eq!(p.choose_energy(&settings, 50), Selection::Confirmed(60));

        let mut p = presenter("q\n");
        assert_eq!(p.choose_energy(&settings, 50), Selection::Cancelled);
    }

    #[test]
    fn pick_flow_inserts_combined_text() {
        let (_tmp, vault) = vault_with_moods();
        let mut app = MoodEnergy::new(fhe_settings(), vault);
        let mut p = presenter("2\n2\n60\n");
        let mut host = TerminalHost::new(Vec::new());

        let outcome = app.run(Command::InsertMoodAndEnergy, &mut p, &mut host);
        assert_eq!(
            outcome,
            CommandOutcome::Inserted("Focused | Energy: FFE".to_string())
        );
        assert_eq!(
            String::from_utf8(host.editor.out).expect("utf8"),
            "Focused | Energy: FFE\n"
        );
    }

    #[test]
    fn pick_flow_cancelled_at_end_of_input() {
        let (_tmp, vault) = vault_with_moods();
        assert_eq!(load_mood_tree(&vault, "moods.txt").all_moods().len(), 4);
        let mut app = MoodEnergy::new(fhe_settings(), vault);
        let mut p = presenter("");
        let mut host = TerminalHost::new(Vec::new());
        assert_eq!(
            app.run(Command::InsertMood, &mut p, &mut host),
            CommandOutcome::Cancelled
        );
        assert!(host.editor.out.is_empty());
    }

    #[test]
    fn compose_picks_output_by_arguments() {
        let settings = fhe_settings();
        assert_eq!(compose(&settings, Some("Calm"), Some(60)).unwrap(), "Calm | Energy: FFE");
        assert_eq!(compose(&settings, Some("Calm"), None).unwrap(), "Calm");
        assert_eq!(compose(&settings, None, Some(0)).unwrap(), "Energy: EEE");
        assert!(compose(&settings, None, None).is_err());
    }

    #[test]
    fn settings_changes_are_validated() {
        let mut settings = Settings::default();
        let args = SettingsArgs {
            file: PathBuf::from("unused.json"),
            moods_file: Some("meta/moods.md".into()),
            display: Some(DisplayArg::Percent),
            bar_icons: None,
            bar_icon_count: Some("12".into()),
        };
        assert!(apply_settings_changes(&mut settings, &args).expect("valid"));
        assert_eq!(settings.moods_file_path, "meta/moods.md");
        assert_eq!(settings.energy_display, EnergyDisplay::Percent);
        assert_eq!(settings.bar_icon_count, 12);

        let bad = SettingsArgs {
            file: PathBuf::from("unused.json"),
            moods_file: None,
            display: None,
            bar_icons: Some("=".into()),
            bar_icon_count: None,
        };
        let err = apply_settings_changes(&mut settings, &bad).expect_err("palette too short");
        assert!(format!("{err:#}").contains("at least two distinct glyphs"));
        assert_eq!(settings.bar_icons, Settings::default().bar_icons);
    }

    #[test]
    fn read_settings_from_file_or_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("data.json");
        assert_eq!(read_settings(None), Settings::default());
        assert_eq!(read_settings(Some(path.as_path())), Settings::default());

        fs::write(&path, r#"{ "energyDisplay": "text", "barIconCount": -1 }"#).expect("write");
        let loaded = read_settings(Some(path.as_path()));
        assert_eq!(loaded.energy_display, EnergyDisplay::Text);
        assert_eq!(loaded.bar_icon_count, 7);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["mood", "bar", "-5", "--count", "3"]).expect("parse");
        assert!(matches!(cli.command, Commands::Bar(BarArgs { value: -5, count: Some(3), .. })));

        let cli = Cli::try_parse_from(["mood", "--verbose", "pick", "--command", "insert-mood"])
            .expect("parse");
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Pick(PickArgs { command: Command::InsertMood, .. })
        ));

        assert!(Cli::try_parse_from(["mood", "pick", "--command", "dance"]).is_err());
    }
}
