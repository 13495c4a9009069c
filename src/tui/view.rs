//! Rendering of the trading screen.

use super::app::App;
use super::state::NoticeLevel;
use super::Theme;
use crate::engine::TradingEngine;
use crate::types::{Instrument, SpecialMode};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Tabs},
    Frame,
};

const LOG_LINES: usize = 4;

pub fn render(frame: &mut Frame, app: &App, now: DateTime<Utc>) {
    let area = frame.size();
    if app.is_loading() {
        render_loading(frame, area, app.theme());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                    // Instrument tabs
            Constraint::Min(8),                       // Chart + account
            Constraint::Length(3),                    // Scroll position
            Constraint::Length(1),                    // Notice
            Constraint::Length(LOG_LINES as u16 + 2), // Logs
            Constraint::Length(1),                    // Help
        ])
        .split(area);

    render_tabs(frame, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);
    render_chart(frame, body[0], app.engine(), app.theme());
    render_account(frame, body[1], app.engine(), app.theme(), now);

    render_scroll(frame, chunks[2], app.engine(), app.theme());
    render_notice(frame, chunks[3], app, now);
    render_logs(frame, chunks[4], app);
    render_help(frame, chunks[5], app);
}

fn render_loading(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("Airoco-fx", theme.title())),
        Line::from(""),
        Line::from(Span::styled(
            "Loading sensor data and account...",
            theme.muted(),
        )),
    ];
    let block = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(theme.border()));
    frame.render_widget(block, area);
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let titles: Vec<Line> = Instrument::all()
        .iter()
        .enumerate()
        .map(|(i, instrument)| {
            Line::from(vec![
                Span::styled(format!("[{}] ", i + 1), theme.muted()),
                Span::raw(instrument.label()),
            ])
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Airoco-fx | {}", app.user_name())),
        )
        .select(app.engine().active_instrument().index())
        .style(theme.tab_inactive())
        .highlight_style(theme.tab_active());

    frame.render_widget(tabs, area);
}

fn render_chart(frame: &mut Frame, area: Rect, engine: &TradingEngine, theme: &Theme) {
    let instrument = engine.active_instrument();
    let samples = engine.visible_samples();
    let title = match engine.displayed_price() {
        Some(price) => format!("{} {:.1} {}", instrument.label(), price, instrument.unit()),
        None => format!("{} (no data)", instrument.label()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(theme.border());

    if samples.is_empty() {
        let empty = Paragraph::new(Span::styled("No sensor data yet.", theme.muted()))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let points: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.value))
        .collect();

    let (min, max) = samples
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), s| (lo.min(s.value), hi.max(s.value)));
    let pad = ((max - min) * 0.1).max(0.5);
    let (lo, hi) = (min - pad, max + pad);

    let time_label = |i: usize| {
        let ts = samples[i].timestamp.with_timezone(&Local);
        Span::styled(ts.format("%m/%d %H:%M").to_string(), theme.muted())
    };
    let last = samples.len() - 1;
    let x_labels = vec![time_label(0), time_label(last / 2), time_label(last)];
    let y_labels = vec![
        Span::raw(format!("{:.1}", lo)),
        Span::raw(format!("{:.1}", (lo + hi) / 2.0)),
        Span::raw(format!("{:.1}", hi)),
    ];

    let dataset = Dataset::default()
        .name(instrument.label())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(theme.instrument(instrument))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, (engine.window().window_size().max(2) - 1) as f64])
                .labels(x_labels),
        )
        .y_axis(Axis::default().bounds([lo, hi]).labels(y_labels));

    frame.render_widget(chart, area);
}

fn render_account(
    frame: &mut Frame,
    area: Rect,
    engine: &TradingEngine,
    theme: &Theme,
    now: DateTime<Utc>,
) {
    let instrument = engine.active_instrument();
    let ledger = engine.ledger();
    let holding = ledger.holding(instrument);
    let mode = engine.mode(instrument);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Money: ", theme.muted()),
            Span::raw(ledger.money().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Price: ", theme.muted()),
            Span::raw(
                engine
                    .quote(instrument)
                    .map(|q| format!("{:.1} (prev {:.1})", q.now_price, q.last_price))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]),
        Line::from(vec![
            Span::styled("Lot: ", theme.muted()),
            Span::raw(format!("{} units", instrument.lot_size())),
        ]),
        Line::from(vec![
            Span::styled("Stock: ", theme.muted()),
            Span::raw(holding.stock.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Mode: ", theme.muted()),
            Span::styled(mode.to_string(), theme.mode(mode)),
        ]),
    ];

    match mode {
        SpecialMode::Off => {}
        SpecialMode::Selecting => {
            let pending = &engine.state_machine().state(instrument).pending_quantity;
            lines.push(Line::from(vec![
                Span::styled("Lots: ", theme.muted()),
                Span::styled(format!("{}_", pending), theme.warning()),
            ]));
        }
        SpecialMode::Active => {
            lines.push(Line::from(vec![
                Span::styled("Special: ", theme.muted()),
                Span::raw(format!(
                    "{} @ {:.0}",
                    holding.special_stock, holding.negotiation_price
                )),
            ]));
            if let Some(left) = engine.state_machine().remaining(instrument, now) {
                let secs = left.num_seconds();
                lines.push(Line::from(vec![
                    Span::styled("Time left: ", theme.muted()),
                    Span::styled(format!("{:02}:{:02}", secs / 60, secs % 60), theme.header()),
                ]));
            }
        }
    }

    lines.push(Line::from(""));
    for (inst, h) in ledger.holdings().iter() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<6}", inst.label()), theme.muted()),
            Span::styled(format!("{:+.0}", h.profit), theme.profit(h.profit)),
        ]));
    }
    let total = ledger.total_profit();
    lines.push(Line::from(vec![
        Span::styled("Total ", theme.title()),
        Span::styled(format!("{:+.0}", total), theme.profit(total)),
    ]));

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Account")
            .border_style(theme.border()),
    );
    frame.render_widget(panel, area);
}

fn render_scroll(frame: &mut Frame, area: Rect, engine: &TradingEngine, theme: &Theme) {
    let ratio = engine.scroll_ratio().clamp(0.0, 1.0);
    let label = engine
        .visible_samples()
        .last()
        .map(|s| {
            s.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_default();

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("History"))
        .gauge_style(theme.info())
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_notice(frame: &mut Frame, area: Rect, app: &App, now: DateTime<Utc>) {
    let Some(notice) = app.notices().visible(now) else {
        return;
    };
    let style = match notice.level {
        NoticeLevel::Info => app.theme().success(),
        NoticeLevel::Error => app.theme().error(),
    };
    frame.render_widget(Paragraph::new(Span::styled(notice.text.clone(), style)), area);
}

fn render_logs(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let lines: Vec<Line> = app
        .log_buffer()
        .recent(LOG_LINES)
        .into_iter()
        .map(|line| {
            let style = if line.contains("ERROR") {
                theme.error()
            } else if line.contains("WARN") {
                theme.warning()
            } else {
                theme.muted()
            };
            Line::from(Span::styled(line, style))
        })
        .collect();

    let block = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Logs")
            .border_style(theme.muted()),
    );
    frame.render_widget(block, area);
}

fn render_help(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let key = |k: &'static str| Span::styled(k, theme.info());
    let mode = app.engine().mode(app.engine().active_instrument());

    let mut spans = match mode {
        SpecialMode::Selecting => vec![
            key("0-9"),
            Span::raw(" lots  "),
            key("Enter"),
            Span::raw(" confirm  "),
            key("Esc"),
            Span::raw(" cancel  "),
            key("m"),
            Span::raw(" leave  "),
        ],
        _ => vec![
            key("1-3"),
            Span::raw(" instrument  "),
            key("b"),
            Span::raw(" buy  "),
            key("s"),
            Span::raw(" sell  "),
            key("m"),
            Span::raw(" special  "),
        ],
    };
    spans.extend([
        key("←/→"),
        Span::raw(" scroll  "),
        key("q"),
        Span::raw(" quit"),
    ]);
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
