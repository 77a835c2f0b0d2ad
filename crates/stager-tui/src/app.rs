use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use stager_lib::{
    chart::{load_segment_charts, ChartSlot},
    Event, Label, SegmentKey, Session,
};
use std::path::PathBuf;

#[derive(Default)]
pub struct TextField {
    pub value: String,
    pub cursor: usize,
}

impl TextField {
    pub fn new(default: &str) -> Self {
        Self {
            value: default.to_string(),
            cursor: default.chars().count(),
        }
    }

    fn byte_offset(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map(|(idx, _)| idx)
            .unwrap_or(self.value.len())
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                let at = self.byte_offset(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_offset(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.len() {
                    let at = self.byte_offset(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Left => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                }
                true
            }
            KeyCode::Right => {
                if self.cursor < self.len() {
                    self.cursor += 1;
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.len();
                true
            }
            _ => false,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PromptKind {
    Import,
    Export,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Import => "Upload annotations CSV (Enter to load, Esc to cancel)",
            PromptKind::Export => "Download annotations CSV (Enter to save, Esc to cancel)",
        }
    }
}

pub struct Prompt {
    pub kind: PromptKind,
    pub field: TextField,
}

pub struct App {
    pub session: Session,
    pub status: String,
    pub status_is_error: bool,
    pub prompt: Option<Prompt>,
    pub annotations_path: PathBuf,
    pub should_quit: bool,
    charts: Option<(SegmentKey, Vec<ChartSlot>)>,
}

impl App {
    pub fn new(session: Session, annotations_path: PathBuf) -> Self {
        Self {
            session,
            status: "←/→ segment, ↑/↓ file, w/n/r/a classify, x clear, i import, e export, q quit"
                .into(),
            status_is_error: false,
            prompt: None,
            annotations_path,
            should_quit: false,
            charts: None,
        }
    }

    /// Charts for the current selection, reloaded when the selection moves.
    pub fn charts(&mut self) -> &[ChartSlot] {
        let key = self.session.selection().key();
        let stale = !matches!(&self.charts, Some((cached, _)) if *cached == key);
        if stale {
            let index = self.session.index();
            let slots = index
                .segment(&key.file, key.segment)
                .map(|segment| load_segment_charts(index, segment))
                .unwrap_or_default();
            self.charts = Some((key, slots));
        }
        self.charts
            .as_ref()
            .map(|(_, slots)| slots.as_slice())
            .unwrap_or(&[])
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if self.prompt.is_some() {
            self.on_prompt_key(key);
            return;
        }
        let event = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Right | KeyCode::Char('l') => Event::NextSegment,
            KeyCode::Left | KeyCode::Char('h') => Event::PrevSegment,
            KeyCode::Down | KeyCode::Char('j') => Event::NextFile,
            KeyCode::Up | KeyCode::Char('k') => Event::PrevFile,
            KeyCode::Char('x') | KeyCode::Delete => Event::ClearLabel,
            KeyCode::Char('i') => {
                self.open_prompt(PromptKind::Import);
                return;
            }
            KeyCode::Char('e') => {
                self.open_prompt(PromptKind::Export);
                return;
            }
            KeyCode::Char(c) => match label_for_key(c) {
                Some(label) => Event::SetLabel(label),
                None => return,
            },
            _ => return,
        };
        self.dispatch(event);
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        let default = self.annotations_path.to_string_lossy().to_string();
        self.prompt = Some(Prompt {
            kind,
            field: TextField::new(&default),
        });
    }

    fn on_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                self.set_status("Cancelled", false);
            }
            KeyCode::Enter => {
                let path = PathBuf::from(prompt.field.value.trim());
                let kind = prompt.kind;
                self.prompt = None;
                if path.as_os_str().is_empty() {
                    self.set_status("A file path is required", true);
                    return;
                }
                let event = match kind {
                    PromptKind::Import => Event::ImportCsv(path.clone()),
                    PromptKind::Export => Event::ExportCsv(path.clone()),
                };
                if self.dispatch(event) {
                    self.annotations_path = path;
                }
            }
            _ => {
                prompt.field.handle_key(&key);
            }
        }
    }

    /// Import the annotations file at startup when enabled and present.
    pub fn autoload(&mut self, enabled: bool) -> bool {
        if !enabled || !self.annotations_path.is_file() {
            return false;
        }
        let path = self.annotations_path.clone();
        self.dispatch(Event::ImportCsv(path))
    }

    /// Apply an event and report the result in the status bar.
    pub fn dispatch(&mut self, event: Event) -> bool {
        match self.session.apply(event) {
            Ok(outcome) => {
                self.set_status(&outcome.message(), false);
                true
            }
            Err(err) => {
                self.set_status(&format!("Error: {}", err), true);
                false
            }
        }
    }

    fn set_status(&mut self, message: &str, is_error: bool) {
        self.status = message.to_string();
        self.status_is_error = is_error;
    }
}

fn label_for_key(c: char) -> Option<Label> {
    Label::from_code(&c.to_ascii_uppercase().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stager_lib::MetadataIndex;
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let index = MetadataIndex::from_json_str(
            r#"{"A": {"segments": [
                    {"line_figs": ["A_1_eeg.json"], "spectrogram_fig": "A_1_spec.json"},
                    {"line_figs": ["A_2_eeg.json"], "spectrogram_fig": "A_2_spec.json"}]},
                "B": {"segments": [
                    {"line_figs": ["B_1_eeg.json"], "spectrogram_fig": "B_1_spec.json"}]}}"#,
        )
        .unwrap()
        .with_figures_dir("/nonexistent");
        App::new(Session::new(index), PathBuf::from("annotations.csv"))
    }

    #[test]
    fn label_keys_classify_current_segment() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('w')));
        app.on_key(key(KeyCode::Right));
        app.on_key(key(KeyCode::Char('R')));
        assert_eq!(app.session.store().get("A", 0), Some(Label::Wake));
        assert_eq!(app.session.store().get("A", 1), Some(Label::Rem));
        assert!(app.status.contains("REM"));
        app.on_key(key(KeyCode::Char('x')));
        assert_eq!(app.session.store().get("A", 1), None);
        app.on_key(key(KeyCode::Char('z')));
        assert_eq!(app.session.store().len(), 1);
    }

    #[test]
    fn file_navigation_clamps_segment() {
        let mut app = app();
        app.on_key(key(KeyCode::Right));
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.session.selection().key(), SegmentKey::new("B", 0));
    }

    #[test]
    fn charts_follow_selection_and_fail_per_chart() {
        let mut app = app();
        let refs: Vec<String> = app.charts().iter().map(|s| s.reference.clone()).collect();
        assert_eq!(refs, vec!["A_1_eeg.json", "A_1_spec.json"]);
        assert!(app.charts().iter().all(|slot| !slot.is_loaded()));
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.charts()[0].reference, "B_1_eeg.json");
    }

    #[test]
    fn export_then_import_through_prompts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut app = app();
        app.on_key(key(KeyCode::Char('n')));
        app.on_key(key(KeyCode::Char('e')));
        let prompt = app.prompt.as_mut().unwrap();
        prompt.field = TextField::new(path.to_str().unwrap());
        app.on_key(key(KeyCode::Enter));
        assert!(!app.status_is_error, "{}", app.status);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "File,Segment,SleepStage\nA,1,N\n"
        );
        assert_eq!(app.annotations_path, path);

        std::fs::write(&path, "File,Segment,SleepStage\nB,1,A\n").unwrap();
        app.on_key(key(KeyCode::Char('i')));
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.session.store().get("B", 0), Some(Label::Artifact));
        assert_eq!(app.session.progress().classified, 2);
    }

    #[test]
    fn autoload_imports_existing_annotations_only_when_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("annotations.csv");
        std::fs::write(&path, "File,Segment,SleepStage\nA,2,W\n").unwrap();

        let mut enabled = app();
        enabled.annotations_path = path.clone();
        assert!(!enabled.autoload(false));
        assert!(enabled.session.store().is_empty());

        assert!(enabled.autoload(true));
        assert_eq!(enabled.session.store().get("A", 1), Some(Label::Wake));
        assert!(!enabled.status_is_error, "{}", enabled.status);

        let mut missing = app();
        missing.annotations_path = dir.path().join("missing.csv");
        assert!(!missing.autoload(true));
        assert!(missing.session.store().is_empty());
        assert!(!missing.status_is_error);
    }

    #[test]
    fn rejected_import_reports_error_and_keeps_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "File,Segment,SleepStage\nA,2,Q\n").unwrap();
        let mut app = app();
        app.on_key(key(KeyCode::Char('a')));
        app.on_key(key(KeyCode::Char('i')));
        app.prompt.as_mut().unwrap().field = TextField::new(path.to_str().unwrap());
        app.on_key(key(KeyCode::Enter));
        assert!(app.status_is_error);
        assert!(app.status.contains("invalid sleep stage"));
        assert_eq!(app.session.store().len(), 1);
        assert_eq!(app.annotations_path, PathBuf::from("annotations.csv"));
    }

    #[test]
    fn prompt_swallows_label_and_quit_keys() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('i')));
        app.on_key(key(KeyCode::Char('q')));
        app.on_key(key(KeyCode::Char('w')));
        assert!(!app.should_quit);
        assert!(app.session.store().is_empty());
        assert!(app.prompt.as_ref().unwrap().field.value.ends_with("qw"));
        app.on_key(key(KeyCode::Esc));
        assert!(app.prompt.is_none());
        app.on_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn text_field_edits_at_cursor() {
        let mut field = TextField::new("ab");
        field.handle_key(&key(KeyCode::Left));
        field.handle_key(&key(KeyCode::Char('é')));
        field.handle_key(&key(KeyCode::End));
        field.handle_key(&key(KeyCode::Backspace));
        assert_eq!(field.value, "aé");
        field.handle_key(&key(KeyCode::Home));
        field.handle_key(&key(KeyCode::Delete));
        assert_eq!(field.value, "é");
    }
}
