//! Mood & energy domain library.
//! The core stays pure (parsing, tree building, bar rendering, templating are plain
//! functions over strings) and the editor, vault and presentation hosts plug in via traits.

pub mod core {
    use serde::{Deserialize, Serialize};
    use std::cmp::Ordering;
    use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

    /* ------------------------------- IDs ------------------------------- */

    /// Index of a section inside a [`MoodTree`] arena.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SectionId(pub usize);

    impl SectionId {
        /// The synthetic root every tree starts with.
        pub const ROOT: SectionId = SectionId(0);
    }

    /* ------------------------------ Entities ------------------------------ */

    /// A named grouping of moods, derived from a heading line.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SectionNode {
        /// Heading text without the `#` markers. Empty for the root.
        pub name: String,

        /// Number of leading `#`; the root is 0.
        pub level: usize,

        /// Leaf labels directly under this heading, in source order.
        #[serde(default)]
        pub moods: Vec<String>,

        /// Direct child sections, in source order.
        #[serde(default)]
        pub sections: Vec<SectionId>,

        /// Back-pointer for "back" navigation. `None` only for the root.
        pub parent: Option<SectionId>,
    }

    impl SectionNode {
        pub fn new(name: impl Into<String>, level: usize, parent: Option<SectionId>) -> Self {
            Self {
                name: name.into(),
                level,
                moods: vec![],
                sections: vec![],
                parent,
            }
        }

        pub fn is_root(&self) -> bool {
            self.parent.is_none()
        }
    }

    /* ------------------------------ Aggregate ------------------------------ */

    /// Aggregate root: the parsed moods file as an arena of sections.
    ///
    /// Nodes are only ever appended by the builder; after that the tree is read-only.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct MoodTree {
        nodes: Vec<SectionNode>,
    }

    impl Default for MoodTree {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MoodTree {
        pub fn new() -> Self {
            Self {
                nodes: vec![SectionNode::new("", 0, None)],
            }
        }

        pub fn root(&self) -> &SectionNode {
            &self.nodes[SectionId::ROOT.0]
        }

        pub fn get(&self, id: SectionId) -> Option<&SectionNode> {
            self.nodes.get(id.0)
        }

        /// Number of sections including the root.
        pub fn len(&self) -> usize {
            self.nodes.len()
        }

        /// True when the file produced neither sections nor moods.
        pub fn is_empty(&self) -> bool {
            let root = self.root();
            root.sections.is_empty() && root.moods.is_empty()
        }

        pub(crate) fn add_section(&mut self, parent: SectionId, name: &str, level: usize) -> SectionId {
            let id = SectionId(self.nodes.len());
            self.nodes.push(SectionNode::new(name, level, Some(parent)));
            self.nodes[parent.0].sections.push(id);
            id
        }

        pub(crate) fn add_mood(&mut self, section: SectionId, mood: &str) {
            self.nodes[section.0].moods.push(mood.to_string());
        }

        /// Direct children of `id` in source order.
        pub fn children(&self, id: SectionId) -> impl Iterator<Item = (SectionId, &SectionNode)> {
            self.get(id)
                .map(|node| node.sections.as_slice())
                .unwrap_or_default()
                .iter()
                .filter_map(|child| self.get(*child).map(|node| (*child, node)))
        }

        pub fn is_child_of(&self, child: SectionId, parent: SectionId) -> bool {
            self.get(child).and_then(|node| node.parent) == Some(parent)
        }

        /// Section names from the top-level heading down to `id` (root excluded).
        pub fn path(&self, id: SectionId) -> Vec<&str> {
            let mut names = Vec::new();
            let mut cursor = self.get(id);
            while let Some(node) = cursor {
                if node.is_root() {
                    break;
                }
                names.push(node.name.as_str());
                cursor = node.parent.and_then(|p| self.get(p));
            }
            names.reverse();
            names
        }

        /// Every mood in the tree, depth-first in source order.
        pub fn all_moods(&self) -> Vec<&str> {
            fn rec<'t>(tree: &'t MoodTree, id: SectionId, out: &mut Vec<&'t str>) {
                if let Some(node) = tree.get(id) {
                    out.extend(node.moods.iter().map(String::as_str));
                    for child in &node.sections {
                        rec(tree, *child, out);
                    }
                }
            }
            let mut out = Vec::new();
            rec(self, SectionId::ROOT, &mut out);
            out
        }

        /// Entries of a section in display order: sorted child sections, a separator
        /// when both kinds are present, then sorted moods.
        pub fn entries(&self, id: SectionId) -> Vec<MenuEntry> {
            let Some(node) = self.get(id) else {
                return vec![];
            };

            let mut sections: Vec<(SectionId, &SectionNode)> = self.children(id).collect();
            sections.sort_by(|a, b| compare_labels(&a.1.name, &b.1.name));
            let mut moods: Vec<&String> = node.moods.iter().collect();
            moods.sort_by(|a, b| compare_labels(a, b));

            let mut out = Vec::with_capacity(sections.len() + moods.len() + 1);
            out.extend(sections.iter().map(|(sid, s)| MenuEntry::Section {
                id: *sid,
                name: s.name.clone(),
            }));
            if !sections.is_empty() && !moods.is_empty() {
                out.push(MenuEntry::Separator);
            }
            out.extend(moods.into_iter().map(|m| MenuEntry::Mood { name: m.clone() }));
            out
        }
    }

    /* ---------------------------- Value Objects ---------------------------- */

    /// One row of a rendered section.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum MenuEntry {
        Section { id: SectionId, name: String },
        Separator,
        Mood { name: String },
    }

    impl MenuEntry {
        pub fn label(&self) -> &str {
            match self {
                MenuEntry::Section { name, .. } | MenuEntry::Mood { name } => name,
                MenuEntry::Separator => "",
            }
        }
    }

    /* -------------------------------- Errors -------------------------------- */

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum MoodError {
        #[error(transparent)]
        Settings(#[from] crate::settings::SettingsError),
        #[error(transparent)]
        Navigation(#[from] crate::navigation::NavigationError),
        #[error("unknown command {0:?}")]
        UnknownCommand(String),
    }

    pub type Result<T> = std::result::Result<T, MoodError>;

    /// Display ordering for section names and moods.
    ///
    /// Accents and case are ignored first (`Énervé` sorts with the e's), then accents
    /// break ties, then case with lowercase first.
    pub fn compare_labels(a: &str, b: &str) -> Ordering {
        fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
            s.nfd()
                .filter(|c| !is_combining_mark(*c))
                .flat_map(char::to_lowercase)
        }
        fn folded(s: &str) -> impl Iterator<Item = char> + '_ {
            s.nfd().flat_map(char::to_lowercase)
        }
        base_letters(a)
            .cmp(base_letters(b))
            .then_with(|| folded(a).cmp(folded(b)))
            .then_with(|| b.cmp(a))
    }

}

pub mod parser {
    //! Moods file parser built on `nom`.
    //!
    //! Parsing strategy:
    //! - `normalize` turns raw text into clean lines: front matter dropped, HTML-like
    //!   tags removed, whitespace trimmed, blank lines skipped.
    //! - `build_tree` is a single line-oriented pass that stack-builds sections by
    //!   heading level (`#`, `##`, ...). Every other line is a mood of the open section.

    use crate::core::{MoodTree, SectionId};
    use nom::{
        IResult,
        bytes::complete::{take_till, take_while, take_while1},
        character::complete::{char, one_of, satisfy},
        combinator::{map, opt, recognize, rest},
        error::VerboseError,
        sequence::{pair, terminated, tuple},
    };

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    const FENCE: &str = "---";

    /* ------------------------ Public entry points ------------------------ */

    /// Parse a moods file straight into a tree.
    pub fn parse_moods(raw: &str) -> MoodTree {
        build_tree(normalize(raw))
    }

    /// Split raw file text into the ordered list of non-empty mood file lines.
    pub fn normalize(raw: &str) -> Vec<String> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let lines: Vec<&str> = raw
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();

        strip_front_matter(&lines)
            .iter()
            .map(|line| strip_tags(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Build the section tree from normalized lines.
    pub fn build_tree<I, S>(lines: I) -> MoodTree
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = MoodTree::new();
        // (section, level); the root sits at the bottom and is never popped.
        let mut stack: Vec<(SectionId, usize)> = vec![(SectionId::ROOT, 0)];

        for line in lines {
            let line = line.as_ref();
            if let Ok((_, (level, name))) = heading(line) {
                while stack.last().is_some_and(|&(_, top)| top >= level) {
                    stack.pop();
                }
                let parent = stack.last().map_or(SectionId::ROOT, |&(id, _)| id);
                let id = tree.add_section(parent, name, level);
                stack.push((id, level));
            } else if !line.is_empty() {
                let current = stack.last().map_or(SectionId::ROOT, |&(id, _)| id);
                tree.add_mood(current, mood_label(line));
            }
        }

        log::debug!(
            "built mood tree: {} section(s), {} mood(s)",
            tree.len() - 1,
            tree.all_moods().len()
        );
        tree
    }

    /* ------------------------------- Lines ------------------------------- */

    /// Drop a leading `---` fenced block. An unclosed fence swallows the rest of the file.
    fn strip_front_matter<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
        match lines.first() {
            Some(first) if first.trim() == FENCE => {
                match lines[1..].iter().position(|l| l.trim() == FENCE) {
                    Some(close) => &lines[close + 2..],
                    None => &[],
                }
            }
            _ => lines,
        }
    }

    fn strip_tags(line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(pos) = rest.find('<') {
            out.push_str(&rest[..pos]);
            let candidate = &rest[pos..];
            match html_tag(candidate) {
                Ok((after, _)) => rest = after,
                Err(_) => {
                    out.push('<');
                    rest = &candidate[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /* ----------------------------- Combinators ----------------------------- */

    /// `<tag ...>` or `</tag>`: a letter right after the bracket, anything up to `>`.
    fn html_tag(i: &str) -> PResult<'_, &str> {
        recognize(tuple((
            char('<'),
            opt(char('/')),
            satisfy(|c: char| c.is_ascii_alphabetic()),
            take_till(|c: char| c == '>'),
            char('>'),
        )))(i)
    }

    /// One or more `#`, then the (trimmed) section name.
    fn heading(i: &str) -> PResult<'_, (usize, &str)> {
        map(
            pair(take_while1(|c: char| c == '#'), rest),
            |(marks, name): (&str, &str)| (marks.len(), name.trim()),
        )(i)
    }

    fn list_marker(i: &str) -> PResult<'_, char> {
        terminated(one_of("-*"), take_while(char::is_whitespace))(i)
    }

    fn mood_label(line: &str) -> &str {
        match list_marker(line) {
            Ok((rest, _)) => rest,
            Err(_) => line,
        }
    }

}

pub mod bar {
    //! Energy bar rendering from a palette of fill-level glyphs.

    use std::collections::BTreeSet;

    pub const DEFAULT_BAR_ICONS: &str = "⣿⣷⣶⣦⣤⣄⣀";
    pub const DEFAULT_BAR_ICON_COUNT: i64 = 7;
    /// Longest bar drawn; longer requests are cut to this many segments.
    pub const MAX_BAR_ICON_COUNT: i64 = 100;

    pub fn distinct_glyphs(palette: &str) -> usize {
        palette.chars().collect::<BTreeSet<_>>().len()
    }

    /// Whether `format_bar` draws glyphs for these settings rather than falling back to the number.
    pub fn is_renderable(palette: &str, segments: i64) -> bool {
        distinct_glyphs(palette) >= 2 && segments >= 1
    }

    /// Render `value` (clamped to 0..=100) as `segments` glyphs from `palette`.
    ///
    /// The palette runs from fullest (index 0) to emptiest. Each segment covers an equal
    /// slice of the range: covered slices get the fullest glyph, untouched ones the
    /// emptiest, and the partially covered one interpolates linearly between them.
    /// Degenerate palettes or lengths render the plain decimal value instead, and
    /// lengths above [`MAX_BAR_ICON_COUNT`] are cut to it.
    pub fn format_bar(palette: &str, value: i64, segments: i64) -> String {
        if !is_renderable(palette, segments) {
            return value.to_string();
        }

        let segments = segments.min(MAX_BAR_ICON_COUNT);
        let glyphs: Vec<char> = palette.chars().collect();
        let emptiest = (glyphs.len() - 1) as f64;
        let percent = value.clamp(0, 100) as f64;
        let count = segments as f64;
        let width = 100.0 / count;

        let mut bar = String::new();
        for i in 0..segments {
            let start = 100.0 * i as f64 / count;
            let full_at = 100.0 * (i + 1) as f64 / count;
            let rel = percent - start;

            let level = if percent >= full_at {
                0.0
            } else if percent <= start {
                emptiest
            } else {
                ((1.0 - rel / width) * emptiest).round()
            };
            bar.push(glyphs[level.clamp(0.0, emptiest) as usize]);
        }
        bar
    }

}

pub mod template {
    //! `{placeholder}` substitution for output formats.

    use indexmap::IndexMap;
    use serde::Serialize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Placeholder {
        Value,
        Mood,
        Energy,
    }

    impl Placeholder {
        pub const ALL: [Placeholder; 3] = [Placeholder::Value, Placeholder::Mood, Placeholder::Energy];

        pub const fn token(self) -> &'static str {
            match self {
                Placeholder::Value => "{value}",
                Placeholder::Mood => "{mood}",
                Placeholder::Energy => "{energy}",
            }
        }
    }

    /// Ordered placeholder values; substitution happens in insertion order.
    pub type Substitutions = IndexMap<Placeholder, String>;

    /// Replace the first occurrence of each placeholder, one placeholder after another.
    /// Later occurrences of the same token are left untouched.
    pub fn render(template: &str, subs: &Substitutions) -> String {
        subs.iter().fold(template.to_string(), |out, (placeholder, value)| {
            out.replacen(placeholder.token(), value, 1)
        })
    }

    /// Placeholders a template mentions, in `Placeholder::ALL` order.
    pub fn placeholders_in(template: &str) -> Vec<Placeholder> {
        Placeholder::ALL
            .into_iter()
            .filter(|p| template.contains(p.token()))
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn subs(pairs: &[(Placeholder, &str)]) -> Substitutions {
            pairs.iter().map(|(p, v)| (*p, v.to_string())).collect()
        }

        #[test]
        fn only_first_occurrence_is_replaced() {
            assert_eq!(
                render("{value}-{value}", &subs(&[(Placeholder::Value, "X")])),
                "X-{value}"
            );
        }

        #[test]
        fn unknown_and_missing_placeholders_stay() {
            assert_eq!(
                render("{mood} / {other}", &subs(&[(Placeholder::Energy, "E")])),
                "{mood} / {other}"
            );
            assert_eq!(render("plain", &Substitutions::new()), "plain");
        }

        #[test]
        fn substitutions_apply_in_order() {
            let out = render(
                "{mood} | {energy}",
                &subs(&[(Placeholder::Mood, "Calm"), (Placeholder::Energy, "Energy: 40")]),
            );
            assert_eq!(out, "Calm | Energy: 40");
        }

        #[test]
        fn inserted_text_is_not_expanded_again() {
            let out = render("{value}", &subs(&[(Placeholder::Value, "{value}!")]));
            assert_eq!(out, "{value}!");
        }

        #[test]
        fn placeholders_are_detected() {
            assert_eq!(
                placeholders_in("{energy} {mood}"),
                vec![Placeholder::Mood, Placeholder::Energy]
            );
            assert!(placeholders_in("nothing").is_empty());
        }
    }
}

pub mod settings {
    //! Persisted plugin configuration.
    //!
    //! Settings are a flat JSON object with camelCase keys. Missing keys take their
    //! defaults, unknown keys are ignored, and obviously broken values are repaired
    //! once at load time.

    use crate::bar::{DEFAULT_BAR_ICON_COUNT, DEFAULT_BAR_ICONS, MAX_BAR_ICON_COUNT, distinct_glyphs};
    use crate::template::{Placeholder, placeholders_in};
    use anyhow::{Context, Result};
    use nom::{
        IResult,
        character::complete::{digit1, one_of},
        combinator::{opt, recognize},
        sequence::pair,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::{Map, Value};
    use std::{
        fmt, fs,
        path::{Path, PathBuf},
        str::FromStr,
    };

    /// How the energy value is written out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EnergyDisplay {
        Text,
        Percent,
        #[default]
        Bar,
    }

    impl fmt::Display for EnergyDisplay {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                EnergyDisplay::Text => "text",
                EnergyDisplay::Percent => "percent",
                EnergyDisplay::Bar => "bar",
            })
        }
    }

    impl FromStr for EnergyDisplay {
        type Err = SettingsError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "text" => Ok(EnergyDisplay::Text),
                "percent" => Ok(EnergyDisplay::Percent),
                "bar" => Ok(EnergyDisplay::Bar),
                other => Err(SettingsError::UnknownDisplay(other.to_string())),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum SettingsError {
        #[error("bar icon count {0:?} is not a number")]
        NotANumber(String),
        #[error("bar icon count must be positive, got {0}")]
        NonPositiveCount(i64),
        #[error("bar icon count {0} is above the maximum of {max}", max = MAX_BAR_ICON_COUNT)]
        CountTooLarge(i64),
        #[error("bar icons need at least two distinct glyphs, got {0:?}")]
        PaletteTooShort(String),
        #[error("unknown energy display {0:?} (expected text, percent or bar)")]
        UnknownDisplay(String),
        #[error("{key} {format:?} uses none of its placeholders")]
        MissingPlaceholder { key: &'static str, format: String },
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct Settings {
        /// Vault path of the moods list.
        pub moods_file_path: String,
        pub energy_display: EnergyDisplay,
        /// Glyphs from full to empty.
        pub bar_icons: String,
        pub bar_icon_count: i64,
        /// `{value}` is the number, percentage or bar.
        pub energy_only_format: String,
        /// `{value}` is the mood.
        pub mood_only_format: String,
        /// `{mood}` and `{energy}`; the latter is the rendered energy-only output.
        pub mood_and_energy_format: String,
        pub show_mood_ribbon: bool,
        pub show_energy_ribbon: bool,
        pub show_combined_ribbon: bool,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                moods_file_path: "moods.txt".to_string(),
                energy_display: EnergyDisplay::default(),
                bar_icons: DEFAULT_BAR_ICONS.to_string(),
                bar_icon_count: DEFAULT_BAR_ICON_COUNT,
                energy_only_format: "Energy: {value}".to_string(),
                mood_only_format: "{value}".to_string(),
                mood_and_energy_format: "{mood} | {energy}".to_string(),
                show_mood_ribbon: true,
                show_energy_ribbon: true,
                show_combined_ribbon: true,
            }
        }
    }

    impl Settings {
        /// Every problem with the current values. The formatter copes with all of
        /// them, but the UI should not have let them through.
        pub fn problems(&self) -> Vec<SettingsError> {
            let mut out = Vec::new();
            if self.bar_icon_count < 1 {
                out.push(SettingsError::NonPositiveCount(self.bar_icon_count));
            }
            if self.bar_icon_count > MAX_BAR_ICON_COUNT {
                out.push(SettingsError::CountTooLarge(self.bar_icon_count));
            }
            if distinct_glyphs(&self.bar_icons) < 2 {
                out.push(SettingsError::PaletteTooShort(self.bar_icons.clone()));
            }

            // Empty mood formats fall back to their defaults; an empty energy format does not.
            const VALUE: &[Placeholder] = &[Placeholder::Value];
            const MOOD_OR_ENERGY: &[Placeholder] = &[Placeholder::Mood, Placeholder::Energy];
            let formats: [(&'static str, &str, &[Placeholder], bool); 3] = [
                ("energyOnlyFormat", self.energy_only_format.as_str(), VALUE, false),
                ("moodOnlyFormat", self.mood_only_format.as_str(), VALUE, true),
                (
                    "moodAndEnergyFormat",
                    self.mood_and_energy_format.as_str(),
                    MOOD_OR_ENERGY,
                    true,
                ),
            ];
            for (key, format, expected, empty_ok) in formats {
                if empty_ok && format.is_empty() {
                    continue;
                }
                if !placeholders_in(format).iter().any(|p| expected.contains(p)) {
                    out.push(SettingsError::MissingPlaceholder {
                        key,
                        format: format.to_string(),
                    });
                }
            }
            out
        }

        /// Repair values loaded from disk. An out-of-range bar length is reset to the
        /// default; other problems are only logged.
        pub fn sanitized(mut self) -> Self {
            for problem in self.problems() {
                log::warn!("settings: {problem}");
                if let SettingsError::NonPositiveCount(_) | SettingsError::CountTooLarge(_) = problem {
                    self.bar_icon_count = DEFAULT_BAR_ICON_COUNT;
                }
            }
            self
        }

        /// Apply a batch of user edits through the validating setters.
        /// Stops at the first rejected value; returns whether anything was requested.
        pub fn apply(&mut self, patch: &SettingsPatch) -> crate::core::Result<bool> {
            let mut changed = false;
            if let Some(path) = &patch.moods_file_path {
                self.moods_file_path = path.clone();
                changed = true;
            }
            if let Some(display) = &patch.energy_display {
                self.set_energy_display(display)?;
                changed = true;
            }
            if let Some(icons) = &patch.bar_icons {
                self.set_bar_icons(icons)?;
                changed = true;
            }
            if let Some(raw) = &patch.bar_icon_count {
                self.set_bar_icon_count(raw)?;
                changed = true;
            }
            Ok(changed)
        }

        /// Update the bar length from user input. Leading digits are enough
        /// (`"12 icons"` reads as 12); anything else keeps the old value.
        pub fn set_bar_icon_count(&mut self, raw: &str) -> Result<i64, SettingsError> {
            let count =
                leading_int(raw).ok_or_else(|| SettingsError::NotANumber(raw.to_string()))?;
            if count < 1 {
                return Err(SettingsError::NonPositiveCount(count));
            }
            if count > MAX_BAR_ICON_COUNT {
                return Err(SettingsError::CountTooLarge(count));
            }
            self.bar_icon_count = count;
            Ok(count)
        }

        pub fn set_bar_icons(&mut self, palette: &str) -> Result<(), SettingsError> {
            if distinct_glyphs(palette) < 2 {
                return Err(SettingsError::PaletteTooShort(palette.to_string()));
            }
            self.bar_icons = palette.to_string();
            Ok(())
        }

        pub fn set_energy_display(&mut self, raw: &str) -> Result<EnergyDisplay, SettingsError> {
            let display = raw.parse()?;
            self.energy_display = display;
            Ok(display)
        }
    }

    /// Raw user edits, as typed into a settings form.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct SettingsPatch {
        pub moods_file_path: Option<String>,
        pub energy_display: Option<String>,
        pub bar_icons: Option<String>,
        pub bar_icon_count: Option<String>,
    }

    fn leading_int(raw: &str) -> Option<i64> {
        fn signed(i: &str) -> IResult<&str, &str> {
            recognize(pair(opt(one_of("+-")), digit1))(i)
        }
        let (_, digits) = signed(raw.trim_start()).ok()?;
        digits.parse().ok()
    }

    /* ------------------------------- Storage ------------------------------- */

    /// Key/value persistence for the settings object.
    pub trait SettingsStore {
        /// `Ok(None)` when nothing has been saved yet.
        fn load_data(&self) -> Result<Option<Value>>;
        fn save_data(&self, data: &Value) -> Result<()>;
    }

    /// Settings kept as a pretty-printed JSON file.
    #[derive(Debug, Clone)]
    pub struct JsonFileStore {
        path: PathBuf,
    }

    impl JsonFileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SettingsStore for JsonFileStore {
        fn load_data(&self) -> Result<Option<Value>> {
            if !self.path.exists() {
                return Ok(None);
            }
            let text = fs::read_to_string(&self.path)
                .with_context(|| format!("reading {:?}", self.path))?;
            let value = serde_json::from_str(&text)
                .with_context(|| format!("parsing {:?}", self.path))?;
            Ok(Some(value))
        }

        fn save_data(&self, data: &Value) -> Result<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
            }
            let text = serde_json::to_string_pretty(data)?;
            fs::write(&self.path, text.as_bytes())
                .with_context(|| format!("writing {:?}", self.path))
        }
    }

    /// Load settings, falling back to defaults for anything missing or unreadable.
    pub fn load_settings(store: &dyn SettingsStore) -> Settings {
        match store.load_data() {
            Ok(None) | Ok(Some(Value::Null)) => Settings::default(),
            Ok(Some(Value::Object(stored))) => merge_over_defaults(stored).sanitized(),
            Ok(Some(other)) => {
                log::warn!("ignoring settings that are not an object: {other}");
                Settings::default()
            }
            Err(err) => {
                log::warn!("failed to load settings: {err:#}");
                Settings::default()
            }
        }
    }

    /// Take each stored key that deserializes on its own; bad and unknown keys keep the default.
    fn merge_over_defaults(stored: Map<String, Value>) -> Settings {
        let defaults = Settings::default();
        let Ok(Value::Object(base)) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        let mut merged = base.clone();
        for (key, value) in stored {
            if !base.contains_key(&key) {
                log::debug!("ignoring unknown settings key {key:?}");
                continue;
            }
            let mut trial = base.clone();
            trial.insert(key.clone(), value.clone());
            match serde_json::from_value::<Settings>(Value::Object(trial)) {
                Ok(_) => {
                    merged.insert(key, value);
                }
                Err(err) => log::warn!("ignoring settings key {key:?}: {err}"),
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
    }

    pub fn save_settings(store: &dyn SettingsStore, settings: &Settings) -> Result<()> {
        let value = serde_json::to_value(settings)?;
        store.save_data(&value)
    }

}

pub mod storage {
    //! Vault access: reading the moods file and listing candidate paths.

    use crate::core::MoodTree;
    use crate::parser::{build_tree, normalize};
    use anyhow::{Context, Result};
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    /// Read access to the user's document store.
    pub trait Vault {
        /// Read a text file by vault-relative path.
        fn read_text_file(&self, path: &str) -> Result<String>;

        /// Every file in the vault as a vault-relative, `/`-separated path.
        fn list_files(&self) -> Result<Vec<String>>;
    }

    /// Canonical vault path: forward slashes, no empty or `.` segments, no leading or
    /// trailing `/`. `..` climbs at most to the vault root, never above it.
    pub fn normalize_path(path: &str) -> String {
        let mut segments: Vec<&str> = Vec::new();
        for seg in path.split(['/', '\\']) {
            match seg {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        segments.join("/")
    }

    /// A vault rooted at a directory on disk.
    #[derive(Debug, Clone)]
    pub struct FsVault {
        root: PathBuf,
    }

    impl FsVault {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        fn abs_path(&self, rel: &str) -> PathBuf {
            self.root.join(normalize_path(rel))
        }
    }

    impl Vault for FsVault {
        fn read_text_file(&self, path: &str) -> Result<String> {
            let abs = self.abs_path(path);
            fs::read_to_string(&abs).with_context(|| format!("reading {:?}", abs))
        }

        fn list_files(&self) -> Result<Vec<String>> {
            let mut out = Vec::new();
            visit_dir(&self.root, &self.root, &mut out)?;
            out.sort();
            Ok(out)
        }
    }

    fn visit_dir(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir).with_context(|| format!("listing {:?}", dir))? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_symlink() || entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            if file_type.is_dir() {
                visit_dir(root, &path, out)?;
            } else if file_type.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    out.push(normalize_path(&rel.to_string_lossy()));
                }
            }
        }
        Ok(())
    }

    /// Read and normalize the moods file. Failures are logged and read as an empty list.
    pub fn load_mood_lines(vault: &dyn Vault, path: &str) -> Vec<String> {
        match vault.read_text_file(path) {
            Ok(text) => normalize(&text),
            Err(err) => {
                log::warn!("failed to load moods file {path:?}: {err:#}");
                vec![]
            }
        }
    }

    /// Fresh tree for every request; nothing is cached between calls.
    pub fn load_mood_tree(vault: &dyn Vault, path: &str) -> MoodTree {
        build_tree(load_mood_lines(vault, path))
    }

    pub const MAX_SUGGESTIONS: usize = 20;

    /// Paths containing `query` (case-insensitive), in vault order, capped at [`MAX_SUGGESTIONS`].
    pub fn suggest_paths<'a>(files: &'a [String], query: &str) -> Vec<&'a str> {
        let needle = query.to_lowercase();
        files
            .iter()
            .filter(|path| path.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(String::as_str)
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn normalize_path_cleans_separators() {
            assert_eq!(normalize_path("./notes//moods.txt"), "notes/moods.txt");
            assert_eq!(normalize_path("\\notes\\moods.txt/"), "notes/moods.txt");
            assert_eq!(normalize_path("moods.txt"), "moods.txt");
        }

        #[test]
        fn parent_segments_stay_inside_the_vault() {
            assert_eq!(normalize_path("../../x"), "x");
            assert_eq!(normalize_path("meta/../moods.txt"), "moods.txt");
            assert_eq!(normalize_path("..\\..\\etc/passwd"), "etc/passwd");

            let tmp = tempfile::tempdir().expect("tempdir");
            let vault_root = tmp.path().join("vault");
            fs::create_dir_all(&vault_root).expect("mkdir");
            fs::write(tmp.path().join("secret.txt"), "Outside").expect("write");
            fs::write(vault_root.join("secret.txt"), "Inside").expect("write");

            let vault = FsVault::new(&vault_root);
            assert_eq!(load_mood_lines(&vault, "../secret.txt"), vec!["Inside"]);
        }

        #[test]
        fn missing_file_reads_as_empty_list() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let vault = FsVault::new(tmp.path());
            assert!(load_mood_lines(&vault, "nope.txt").is_empty());
            assert!(load_mood_tree(&vault, "nope.txt").is_empty());
        }

        #[test]
        fn directory_path_reads_as_empty_list() {
            let tmp = tempfile::tempdir().expect("tempdir");
            fs::create_dir_all(tmp.path().join("moods.txt")).expect("mkdir");
            let vault = FsVault::new(tmp.path());
            assert!(load_mood_lines(&vault, "moods.txt").is_empty());
        }

        #[test]
        fn loads_and_parses_from_disk() {
            let tmp = tempfile::tempdir().expect("tempdir");
            fs::create_dir_all(tmp.path().join("meta")).expect("mkdir");
            fs::write(tmp.path().join("meta/moods.md"), "# Work\n- Focused\n").expect("write");

            let vault = FsVault::new(tmp.path());
            assert_eq!(load_mood_lines(&vault, "/meta/moods.md"), vec!["# Work", "- Focused"]);
            let tree = load_mood_tree(&vault, "meta/moods.md");
            assert_eq!(tree.all_moods(), vec!["Focused"]);
        }

        #[test]
        fn list_files_walks_and_skips_hidden() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let root = tmp.path();
            fs::create_dir_all(root.join("daily/2025")).expect("mkdir");
            fs::create_dir_all(root.join(".obsidian")).expect("mkdir");
            fs::write(root.join("moods.txt"), "Happy").expect("write");
            fs::write(root.join("daily/2025/01.md"), "").expect("write");
            fs::write(root.join(".obsidian/data.json"), "{}").expect("write");

            let files = FsVault::new(root).list_files().expect("list");
            assert_eq!(files, vec!["daily/2025/01.md", "moods.txt"]);
        }

        #[test]
        fn suggestions_filter_case_insensitively_and_cap() {
            let files: Vec<String> = vec!["Moods.txt".into(), "daily/a.md".into(), "meta/MOODS-old.txt".into()];
            assert_eq!(suggest_paths(&files, "moods"), vec!["Moods.txt", "meta/MOODS-old.txt"]);
            assert_eq!(suggest_paths(&files, "").len(), 3);

            let many: Vec<String> = (0..50).map(|i| format!("note-{i:02}.md")).collect();
            let hits = suggest_paths(&many, "NOTE");
            assert_eq!(hits.len(), MAX_SUGGESTIONS);
            assert_eq!(hits[0], "note-00.md");
        }
    }
}

pub mod navigation {
    //! Drill-down navigation over a [`MoodTree`].
    //!
    //! The tree stays immutable; the navigator only holds the current section and
    //! the trail of sections it came from.

    use crate::core::{MenuEntry, MoodTree, SectionId, SectionNode};

    /// Outcome of a selection surface.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Selection<T> {
        Confirmed(T),
        Cancelled,
    }

    impl<T> Selection<T> {
        pub fn confirmed(self) -> Option<T> {
            match self {
                Selection::Confirmed(v) => Some(v),
                Selection::Cancelled => None,
            }
        }

        pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Selection<U> {
            match self {
                Selection::Confirmed(v) => Selection::Confirmed(f(v)),
                Selection::Cancelled => Selection::Cancelled,
            }
        }

        pub fn is_cancelled(&self) -> bool {
            matches!(self, Selection::Cancelled)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum NavigationError {
        #[error("section {0:?} is not a child of the current section")]
        NotAChild(SectionId),
        #[error("mood {0:?} is not listed in the current section")]
        UnknownMood(String),
        #[error("no entry named {0:?} in the current section")]
        NoSuchEntry(String),
    }

    #[derive(Debug, Clone)]
    pub struct MoodNavigator<'t> {
        tree: &'t MoodTree,
        current: SectionId,
        trail: Vec<SectionId>,
    }

    impl<'t> MoodNavigator<'t> {
        pub fn new(tree: &'t MoodTree) -> Self {
            Self {
                tree,
                current: SectionId::ROOT,
                trail: Vec::new(),
            }
        }

        pub fn tree(&self) -> &'t MoodTree {
            self.tree
        }

        pub fn current(&self) -> SectionId {
            self.current
        }

        pub fn current_section(&self) -> &'t SectionNode {
            self.tree.get(self.current).unwrap_or_else(|| self.tree.root())
        }

        pub fn at_root(&self) -> bool {
            self.trail.is_empty()
        }

        /// Section names leading to the current section.
        pub fn breadcrumb(&self) -> Vec<&'t str> {
            self.tree.path(self.current)
        }

        /// The current section in display order.
        pub fn entries(&self) -> Vec<MenuEntry> {
            self.tree.entries(self.current)
        }

        /// Drill into a direct child of the current section.
        pub fn enter(&mut self, child: SectionId) -> Result<(), NavigationError> {
            if !self.tree.is_child_of(child, self.current) {
                return Err(NavigationError::NotAChild(child));
            }
            self.trail.push(self.current);
            self.current = child;
            Ok(())
        }

        /// Return to the previous section. `false` when already at the start.
        pub fn back(&mut self) -> bool {
            match self.trail.pop() {
                Some(previous) => {
                    self.current = previous;
                    true
                }
                None => false,
            }
        }

        /// Pick a mood of the current section, ending the interaction.
        pub fn choose(&self, mood: &str) -> Result<Selection<String>, NavigationError> {
            if self.current_section().moods.iter().any(|m| m == mood) {
                Ok(Selection::Confirmed(mood.to_string()))
            } else {
                Err(NavigationError::UnknownMood(mood.to_string()))
            }
        }

        /// Escape key: go back a level, or cancel when there is nowhere to go back to.
        pub fn escape(&mut self) -> Option<Selection<String>> {
            if self.back() {
                None
            } else {
                Some(Selection::Cancelled)
            }
        }

        /// Activate a rendered entry. Sections are entered; moods finish the interaction.
        pub fn activate(
            &mut self,
            entry: &MenuEntry,
        ) -> Result<Option<Selection<String>>, NavigationError> {
            match entry {
                MenuEntry::Section { id, .. } => self.enter(*id).map(|()| None),
                MenuEntry::Mood { name } => self.choose(name).map(Some),
                MenuEntry::Separator => Ok(None),
            }
        }
    }

    impl MoodNavigator<'_> {
        /// Activate the entry whose label matches `label`, ignoring case.
        /// Sections win over moods of the same name.
        pub fn activate_label(
            &mut self,
            label: &str,
        ) -> crate::core::Result<Option<Selection<String>>> {
            let wanted = label.trim();
            let entry = self
                .entries()
                .into_iter()
                .filter(|e| !matches!(e, MenuEntry::Separator))
                .find(|e| e.label().to_lowercase() == wanted.to_lowercase())
                .ok_or_else(|| NavigationError::NoSuchEntry(wanted.to_string()))?;
            Ok(self.activate(&entry)?)
        }
    }

}

pub mod session {
    //! Single-open-surface policy.
    //!
    //! The presentation side owns one `SessionSlot`. Opening a surface replaces
    //! whatever was open before; commands refuse to start while one is open.

    use serde::Serialize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum SessionKind {
        MoodMenu,
        EnergySlider,
        MoodAndEnergy,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionHandle {
        id: u64,
        kind: SessionKind,
    }

    impl SessionHandle {
        pub fn id(&self) -> u64 {
            self.id
        }

        pub fn kind(&self) -> SessionKind {
            self.kind
        }
    }

    #[derive(Debug, Default)]
    pub struct SessionSlot {
        current: Option<SessionHandle>,
        opened: u64,
    }

    impl SessionSlot {
        pub fn new() -> Self {
            Self::default()
        }

        /// Open a new surface, closing the previous one if any.
        pub fn open(&mut self, kind: SessionKind) -> SessionHandle {
            if let Some(previous) = self.current.take() {
                log::debug!("closing {:?} session #{} for {:?}", previous.kind, previous.id, kind);
            }
            self.opened += 1;
            let handle = SessionHandle {
                id: self.opened,
                kind,
            };
            self.current = Some(handle);
            handle
        }

        /// Close `handle`. A stale handle (already replaced) leaves the slot alone.
        pub fn close(&mut self, handle: SessionHandle) -> bool {
            if self.current == Some(handle) {
                self.current = None;
                true
            } else {
                false
            }
        }

        pub fn is_open(&self) -> bool {
            self.current.is_some()
        }

        pub fn current(&self) -> Option<SessionHandle> {
            self.current
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn opening_replaces_previous_session() {
            let mut slot = SessionSlot::new();
            assert!(!slot.is_open());
            let first = slot.open(SessionKind::MoodMenu);
            let second = slot.open(SessionKind::EnergySlider);
            assert_ne!(first.id(), second.id());
            assert_eq!(slot.current(), Some(second));

            assert!(!slot.close(first));
            assert!(slot.is_open());
            assert!(slot.close(second));
            assert!(!slot.is_open());
            assert!(!slot.close(second));
        }
    }
}

pub mod format {
    //! Plain-text outline of a mood tree, in display order.

    use crate::core::{MenuEntry, MoodTree, SectionId};
    use std::fmt::Write;

    pub fn format_outline(tree: &MoodTree) -> String {
        let mut out = String::new();
        write_section(tree, SectionId::ROOT, 0, &mut out);
        out
    }

    fn write_section(tree: &MoodTree, id: SectionId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        for entry in tree.entries(id) {
            match entry {
                MenuEntry::Section { id: child, name } => {
                    let level = tree.get(child).map_or(1, |n| n.level);
                    let _ = writeln!(out, "{indent}{} {name}", "#".repeat(level));
                    write_section(tree, child, depth + 1, out);
                }
                MenuEntry::Mood { name } => {
                    let _ = writeln!(out, "{indent}- {name}");
                }
                MenuEntry::Separator => {}
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::parser::parse_moods;

        #[test]
        fn outline_is_sorted_and_indented() {
            let tree = parse_moods("Okay\n# Work\n- Tired\n- Focused\n## Deep\nFlow\n# Home\n- Relaxed\n");
            let expected = "\
# Home
  - Relaxed
# Work
  ## Deep
    - Flow
  - Focused
  - Tired
- Okay
";
            assert_eq!(format_outline(&tree), expected);
        }

        #[test]
        fn empty_tree_formats_to_nothing() {
            assert_eq!(format_outline(&MoodTree::new()), "");
        }
    }
}

pub mod projectors {
    pub mod output_projector {
        //! Final text for each kind of insertion, projected from settings.

        use crate::bar::format_bar;
        use crate::settings::{EnergyDisplay, Settings};
        use crate::template::{Placeholder, Substitutions, render};

        const DEFAULT_MOOD_FORMAT: &str = "{value}";
        const DEFAULT_COMBINED_FORMAT: &str = "{mood} | {energy}";

        /// What `{value}` becomes in the energy-only format.
        pub fn energy_value(settings: &Settings, value: i64) -> String {
            match settings.energy_display {
                EnergyDisplay::Text => value.to_string(),
                EnergyDisplay::Percent => format!("{value}%"),
                EnergyDisplay::Bar => {
                    format_bar(&settings.bar_icons, value, settings.bar_icon_count)
                }
            }
        }

        pub fn energy_output(settings: &Settings, value: i64) -> String {
            render(
                &settings.energy_only_format,
                &Substitutions::from([(Placeholder::Value, energy_value(settings, value))]),
            )
        }

        pub fn mood_output(settings: &Settings, mood: &str) -> String {
            render(
                non_empty_or(&settings.mood_only_format, DEFAULT_MOOD_FORMAT),
                &Substitutions::from([(Placeholder::Value, mood.to_string())]),
            )
        }

        pub fn mood_and_energy_output(settings: &Settings, mood: &str, value: i64) -> String {
            render(
                non_empty_or(&settings.mood_and_energy_format, DEFAULT_COMBINED_FORMAT),
                &Substitutions::from([
                    (Placeholder::Mood, mood.to_string()),
                    (Placeholder::Energy, energy_output(settings, value)),
                ]),
            )
        }

        fn non_empty_or<'a>(format: &'a str, fallback: &'a str) -> &'a str {
            if format.is_empty() { fallback } else { format }
        }

    }
}

pub mod commands {
    //! The insert commands and the host seams they run against.

    use crate::core::{MoodError, MoodTree};
    use crate::navigation::{MoodNavigator, Selection};
    use crate::projectors::output_projector::{energy_output, mood_and_energy_output, mood_output};
    use crate::session::{SessionKind, SessionSlot};
    use crate::settings::Settings;
    use crate::storage::{Vault, load_mood_tree};
    use serde::Serialize;
    use std::{fmt, str::FromStr};

    /// Slider start position.
    pub const DEFAULT_ENERGY: u8 = 50;
    pub const MAX_ENERGY: u8 = 100;

    /* ------------------------------- Hosts ------------------------------- */

    pub trait Editor {
        fn focus(&mut self);
        fn replace_selection(&mut self, text: &str);
    }

    pub trait EditorHost {
        /// The editor of the focused document, if there is one.
        fn active_editor(&mut self) -> Option<&mut dyn Editor>;
    }

    /// Selection surfaces. Implementations decide how entries are shown; the
    /// navigator decides what they are.
    pub trait Presenter {
        fn choose_mood(&mut self, navigator: MoodNavigator<'_>) -> Selection<String>;

        fn choose_energy(&mut self, settings: &Settings, initial: u8) -> Selection<u8>;

        fn choose_mood_and_energy(
            &mut self,
            navigator: MoodNavigator<'_>,
            settings: &Settings,
            initial: u8,
        ) -> Selection<(String, u8)>;
    }

    /* ------------------------------ Commands ------------------------------ */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub enum Command {
        InsertMood,
        InsertEnergy,
        InsertMoodAndEnergy,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Modifier {
        Alt,
        Ctrl,
        Shift,
        Mod,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hotkey {
        pub modifiers: &'static [Modifier],
        pub key: char,
    }

    impl fmt::Display for Hotkey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for m in self.modifiers {
                write!(f, "{m:?}+")?;
            }
            write!(f, "{}", self.key)
        }
    }

    impl Command {
        pub const ALL: [Command; 3] = [
            Command::InsertMood,
            Command::InsertEnergy,
            Command::InsertMoodAndEnergy,
        ];

        pub fn id(self) -> &'static str {
            match self {
                Command::InsertMood => "insert-mood",
                Command::InsertEnergy => "insert-energy-level",
                Command::InsertMoodAndEnergy => "insert-mood-and-energy",
            }
        }

        pub fn name(self) -> &'static str {
            match self {
                Command::InsertMood => "Insert Mood",
                Command::InsertEnergy => "Insert Energy Level",
                Command::InsertMoodAndEnergy => "Insert Mood and Energy Level",
            }
        }

        pub fn hotkey(self) -> Hotkey {
            let key = match self {
                Command::InsertMood => '6',
                Command::InsertEnergy => '5',
                Command::InsertMoodAndEnergy => '7',
            };
            Hotkey {
                modifiers: &[Modifier::Alt],
                key,
            }
        }

        pub fn from_id(id: &str) -> Option<Self> {
            Self::ALL.into_iter().find(|c| c.id() == id)
        }

        pub fn session_kind(self) -> SessionKind {
            match self {
                Command::InsertMood => SessionKind::MoodMenu,
                Command::InsertEnergy => SessionKind::EnergySlider,
                Command::InsertMoodAndEnergy => SessionKind::MoodAndEnergy,
            }
        }
    }

    impl FromStr for Command {
        type Err = MoodError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::from_id(s.trim()).ok_or_else(|| MoodError::UnknownCommand(s.to_string()))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CommandOutcome {
        /// Text went into the active editor.
        Inserted(String),
        Cancelled,
        /// Confirmed, but there was no editor to insert into.
        NoEditor,
        /// Another selection surface is still open.
        Busy,
    }

    /* -------------------------------- App -------------------------------- */

    /// Settings, vault and the session slot, as owned by the plugin instance.
    pub struct MoodEnergy<V: Vault> {
        settings: Settings,
        vault: V,
        sessions: SessionSlot,
    }

    impl<V: Vault> MoodEnergy<V> {
        pub fn new(settings: Settings, vault: V) -> Self {
            Self {
                settings,
                vault,
                sessions: SessionSlot::new(),
            }
        }

        pub fn settings(&self) -> &Settings {
            &self.settings
        }

        pub fn settings_mut(&mut self) -> &mut Settings {
            &mut self.settings
        }

        pub fn vault(&self) -> &V {
            &self.vault
        }

        pub fn sessions(&self) -> &SessionSlot {
            &self.sessions
        }

        pub fn sessions_mut(&mut self) -> &mut SessionSlot {
            &mut self.sessions
        }

        /// Commands only start when no other surface is open.
        pub fn can_run(&self) -> bool {
            !self.sessions.is_open()
        }

        pub fn load_tree(&self) -> MoodTree {
            load_mood_tree(&self.vault, &self.settings.moods_file_path)
        }

        pub fn run(
            &mut self,
            command: Command,
            presenter: &mut dyn Presenter,
            editors: &mut dyn EditorHost,
        ) -> CommandOutcome {
            if !self.can_run() {
                log::debug!("{}: another selection is open", command.id());
                return CommandOutcome::Busy;
            }

            let handle = self.sessions.open(command.session_kind());
            let selection = self.select(command, presenter);
            self.sessions.close(handle);

            match selection {
                Selection::Confirmed(text) => insert(editors, &text),
                Selection::Cancelled => {
                    log::debug!("{}: cancelled", command.id());
                    CommandOutcome::Cancelled
                }
            }
        }

        fn select(&self, command: Command, presenter: &mut dyn Presenter) -> Selection<String> {
            let settings = &self.settings;
            match command {
                Command::InsertMood => {
                    let tree = self.load_tree();
                    non_empty(presenter.choose_mood(MoodNavigator::new(&tree)))
                        .map(|mood| mood_output(settings, &mood))
                }
                Command::InsertEnergy => presenter
                    .choose_energy(settings, DEFAULT_ENERGY)
                    .map(|value| energy_output(settings, clamp_energy(value))),
                Command::InsertMoodAndEnergy => {
                    let tree = self.load_tree();
                    let picked = presenter.choose_mood_and_energy(
                        MoodNavigator::new(&tree),
                        settings,
                        DEFAULT_ENERGY,
                    );
                    match picked {
                        Selection::Confirmed((mood, value)) if !mood.is_empty() => {
                            Selection::Confirmed(mood_and_energy_output(
                                settings,
                                &mood,
                                clamp_energy(value),
                            ))
                        }
                        _ => Selection::Cancelled,
                    }
                }
            }
        }
    }

    /// Focus the active editor and replace its selection once. No editor, no insertion.
    pub fn insert(editors: &mut dyn EditorHost, text: &str) -> CommandOutcome {
        match editors.active_editor() {
            Some(editor) => {
                editor.focus();
                editor.replace_selection(text);
                CommandOutcome::Inserted(text.to_string())
            }
            None => {
                log::debug!("no active editor; dropping {text:?}");
                CommandOutcome::NoEditor
            }
        }
    }

    fn non_empty(selection: Selection<String>) -> Selection<String> {
        match selection {
            Selection::Confirmed(mood) if mood.is_empty() => Selection::Cancelled,
            other => other,
        }
    }

    fn clamp_energy(value: u8) -> i64 {
        i64::from(value.min(MAX_ENERGY))
    }

}

pub use crate::core::{MoodError, MoodTree, Result};
pub use bar::format_bar;
pub use commands::{Command, CommandOutcome, MoodEnergy};
pub use format::format_outline;
pub use parser::{build_tree, normalize, parse_moods};
pub use template::render;
