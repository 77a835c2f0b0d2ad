use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use stager_lib::{
    chart::{render_segment, ChartKind, ChartRenderer, ChartSlot},
    label::{display_label, Label},
    ViewModel,
};

/// Lists each chart of the segment, with a placeholder for unreadable ones.
///
/// Chart contents are handed to an external renderer; the terminal only shows
/// which definitions are ready.
#[derive(Default)]
pub struct ChartList {
    pub lines: Vec<Line<'static>>,
}

impl ChartRenderer for ChartList {
    fn draw(&mut self, slot: &ChartSlot) -> anyhow::Result<()> {
        let kind = match slot.kind {
            ChartKind::Line => "line chart",
            ChartKind::Spectrogram => "spectrogram",
        };
        match &slot.chart {
            Ok(_) => self.lines.push(Line::from(vec![
                Span::styled("● ", Style::default().fg(Color::Green)),
                Span::raw(format!("{} ({})", slot.reference, kind)),
            ])),
            Err(err) => {
                self.lines.push(Line::from(vec![
                    Span::styled("✗ ", Style::default().fg(Color::Red)),
                    Span::raw(format!("{} ({}) unavailable", slot.reference, kind)),
                ]));
                self.lines.push(Line::from(Span::styled(
                    format!("    {}", err),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        Ok(())
    }
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let view = app.session.view();
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);
    draw_header(f, layout[0], &view);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)])
        .split(layout[1]);
    draw_sidebar(f, body[0], &view);
    draw_charts(f, body[1], app);
    draw_footer(f, layout[2], app);
}

fn label_style(label: Option<Label>) -> Style {
    match label {
        Some(Label::Wake) => Style::default().fg(Color::Yellow),
        Some(Label::NonRem) => Style::default().fg(Color::Blue),
        Some(Label::Rem) => Style::default().fg(Color::Magenta),
        Some(Label::Artifact) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::DarkGray),
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &ViewModel) {
    let label_text = match view.label {
        Some(label) => format!("{} ({})", label.name(), label.code()),
        None => display_label(None).to_string(),
    };
    let line = Line::from(vec![
        Span::styled(
            format!("File: {}, Segment: {}", view.file, view.segment),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" of {}  ", view.segment_count)),
        Span::styled(label_text, label_style(view.label)),
    ]);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Sleep Stage Classification"),
    );
    f.render_widget(header, area);
}

fn draw_sidebar(f: &mut Frame, area: Rect, view: &ViewModel) {
    let file_rows = (view.files.len() as u16).saturating_add(2).min(10);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(file_rows),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let files: Vec<ListItem> = view
        .files
        .iter()
        .map(|counts| {
            let style = if counts.file == view.file {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(
                "{} {} ({}/{})",
                if counts.file == view.file { "▶" } else { " " },
                counts.file,
                counts.labelled,
                counts.total
            ))
            .style(style)
        })
        .collect();
    let files = List::new(files).block(Block::default().borders(Borders::ALL).title("Files"));
    f.render_widget(files, rows[0]);

    let progress = view.progress;
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Segments left: {}", progress.remaining)),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio((progress.percent() / 100.0).clamp(0.0, 1.0))
        .label(format!(
            "Classification Progress: {} / {}",
            progress.classified, progress.total
        ));
    f.render_widget(gauge, rows[1]);

    let keys: Vec<Span> = Label::ALL
        .iter()
        .flat_map(|label| {
            let style = if view.label == Some(*label) {
                label_style(Some(*label)).add_modifier(Modifier::REVERSED)
            } else {
                label_style(Some(*label))
            };
            [
                Span::styled(format!("[{}]", label.code().to_lowercase()), style),
                Span::raw(format!(" {}  ", label.name())),
            ]
        })
        .collect();
    let keys = Paragraph::new(Line::from(keys)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Classify this segment"),
    );
    f.render_widget(keys, rows[2]);

    draw_summary(f, rows[3], view);
}

fn draw_summary(f: &mut Frame, area: Rect, view: &ViewModel) {
    let selected = view
        .summary
        .iter()
        .position(|row| row.file == view.file && row.segment == view.segment);
    let rows: Vec<Row> = view
        .summary
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.file.clone()),
                Cell::from(row.segment.to_string()),
                Cell::from(row.classification_text()).style(label_style(row.classification)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(8),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(vec!["File", "Segment", "Classification"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .block(Block::default().borders(Borders::ALL).title("Summary"));
    let mut state = TableState::default().with_selected(selected);
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_charts(f: &mut Frame, area: Rect, app: &mut App) {
    let mut list = ChartList::default();
    let failures = render_segment(&mut list, app.charts());
    let mut lines = list.lines;
    for failure in failures {
        lines.push(Line::from(Span::styled(
            failure,
            Style::default().fg(Color::Red),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from("No charts listed for this segment."));
    }
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Charts"));
    f.render_widget(panel, area);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    if let Some(prompt) = &app.prompt {
        let input = Paragraph::new(prompt.field.value.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(prompt.kind.title()),
            );
        f.render_widget(input, area);
        let cursor_x = area.x + 1 + prompt.field.cursor as u16;
        f.set_cursor(cursor_x.min(area.right().saturating_sub(2)), area.y + 1);
        return;
    }
    let style = if app.status_is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let status = Paragraph::new(app.status.as_str())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use stager_lib::{MetadataIndex, Session};
    use std::path::PathBuf;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_progress_summary_and_chart_placeholders() {
        let index = MetadataIndex::from_json_str(
            r#"{"A": {"segments": [
                    {"line_figs": ["A_1_eeg.json"], "spectrogram_fig": "A_1_spec.json"},
                    {"line_figs": ["A_2_eeg.json"], "spectrogram_fig": "A_2_spec.json"}]},
                "B": {"segments": [
                    {"line_figs": ["B_1_eeg.json"], "spectrogram_fig": "B_1_spec.json"}]}}"#,
        )
        .unwrap()
        .with_figures_dir("/nonexistent");
        let mut app = App::new(Session::new(index), PathBuf::from("annotations.csv"));
        app.dispatch(stager_lib::Event::SetLabel(Label::Wake));

        let mut terminal = Terminal::new(TestBackend::new(120, 32)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("File: A, Segment: 1"), "{text}");
        assert!(text.contains("Classification Progress: 1 / 3"), "{text}");
        assert!(text.contains("Segments left: 2"), "{text}");
        assert!(text.contains("Undefined"), "{text}");
        assert!(text.contains("A_1_eeg.json (line chart) unavailable"), "{text}");
        assert!(text.contains("A_1_spec.json (spectrogram) unavailable"), "{text}");
    }
}
