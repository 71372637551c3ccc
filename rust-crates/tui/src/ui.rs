use crate::client::ViewSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tarot_contract::ImageTransform;
use tarot_reader::workflow::Stage;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

const CARD_WIDTH: usize = 21;
const CARD_HEIGHT: usize = 13;

pub enum UserEvent {
    Quit,
    AskQuestion(String),
    SignIn(String),
    SignOut,
    Mint,
    Retry,
    Restart,
    DismissWallet,
    Redraw,
}

pub type InputEvents = EventStream;

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    stage: Stage,
    known_accounts: Vec<String>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            stage: Stage::Idle,
            known_accounts: Vec::new(),
            terminal: None,
        }
    }
}

impl UiState {
    /// Opens the question prompt, e.g. when a redirect arrives without one.
    pub fn open_question(&mut self) {
        if !matches!(self.mode, Mode::QuestionModal(_)) {
            self.mode = Mode::QuestionModal(InputState::default());
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    QuestionModal(InputState),
    AccountModal(AccountState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct InputState {
    text: String,
}

#[derive(Clone, Debug, Default)]
struct AccountState {
    idx: usize,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEvents {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEvents) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &ViewSnapshot) -> Result<()> {
    state.stage = snap.stage;
    state.known_accounts = snap.known_accounts.clone();
    if let Mode::AccountModal(ref mut acc) = state.mode {
        acc.idx = acc.idx.min(state.known_accounts.len().saturating_sub(1));
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(k) = event else {
        return matches!(event, Event::Resize(..)).then_some(UserEvent::Redraw);
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    match &mut state.mode {
        Mode::QuestionModal(input) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let question = input.text.trim().to_string();
                    if question.is_empty() {
                        return None;
                    }
                    state.mode = Mode::Normal;
                    Some(UserEvent::AskQuestion(question))
                }
                KeyCode::Backspace => {
                    input.text.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) => {
                    input.text.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::AccountModal(acc) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    acc.idx = acc.idx.saturating_sub(1);
                    Some(UserEvent::Redraw)
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if acc.idx + 1 < state.known_accounts.len() {
                        acc.idx += 1;
                    }
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let account = state.known_accounts.get(acc.idx).cloned()?;
                    state.mode = Mode::Normal;
                    Some(UserEvent::SignIn(account))
                }
                _ => None,
            };
        }
        Mode::QuitModal => {
            return match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    match k.code {
        KeyCode::Esc if state.stage == Stage::WalletRequired => Some(UserEvent::DismissWallet),
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('d') if matches!(state.stage, Stage::Idle | Stage::AwaitingRedirect) => {
            state.mode = Mode::QuestionModal(InputState::default());
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('w') => {
            state.mode = Mode::AccountModal(AccountState::default());
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('x') => Some(UserEvent::SignOut),
        KeyCode::Char('m') => Some(UserEvent::Mint),
        KeyCode::Char('r') if state.stage == Stage::Error => Some(UserEvent::Retry),
        KeyCode::Char('n') => Some(UserEvent::Restart),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &ViewSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),                       // session
            Constraint::Min(CARD_HEIGHT as u16 + 4),     // card + reading
            Constraint::Length(5),                       // status
            Constraint::Length(3),                       // help
        ])
        .split(f.area());

    draw_session_panel(f, chunks[0], snap);
    draw_reading_area(f, chunks[1], snap);
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    if snap.stage == Stage::WalletRequired {
        draw_wallet_overlay(f, snap);
    }
    draw_modals(f, state, snap);
}

fn draw_session_panel(f: &mut Frame, area: Rect, snap: &ViewSnapshot) {
    let account = snap.account.as_deref().unwrap_or("not signed in");
    let text = format!(
        "Network: {} | Account: {} | Contract: {}\nDraw: {} | Mint: {}",
        snap.network, account, snap.contract, snap.draw_price, snap.mint_price
    );
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(widget, area);
}

fn draw_reading_area(f: &mut Frame, area: Rect, snap: &ViewSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(CARD_WIDTH as u16 + 4),
            Constraint::Min(20),
        ])
        .split(area);

    let card_block = Block::default().borders(Borders::ALL).title("Card");
    let card_lines: Vec<Line> = match &snap.draw {
        Some(draw) => {
            let mut lines: Vec<Line> = card_face_lines(&draw.card, snap.transform)
                .into_iter()
                .map(Line::from)
                .collect();
            lines.push(Line::from(""));
            lines.push(Line::from(draw.orientation.clone()).style(
                if snap.transform.is_rotated() {
                    Style::default().fg(Color::Magenta)
                } else {
                    Style::default().fg(Color::Yellow)
                },
            ));
            lines
        }
        None => card_back_lines().into_iter().map(Line::from).collect(),
    };
    f.render_widget(Paragraph::new(card_lines).block(card_block), cols[0]);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(question) = &snap.question {
        lines.push(Line::from(vec![
            Span::styled("Question: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(question.clone()),
        ]));
        lines.push(Line::from(""));
    }
    match &snap.reading {
        Some(text) => {
            for line in text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from(stage_hint(snap)).style(Style::default().fg(Color::Gray))),
    }
    if let Some(url) = &snap.image_url {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Image: {url}")).style(Style::default().fg(Color::Blue)));
    }
    if let Some(tx_hash) = &snap.tx_hash {
        lines.push(Line::from(format!("Transaction: {tx_hash}")));
    }
    if let Some(token_id) = &snap.token_id {
        lines.push(Line::from(format!("Token: {token_id}")));
    }
    let reading = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Reading"));
    f.render_widget(reading, cols[1]);
}

fn stage_hint(snap: &ViewSnapshot) -> String {
    match snap.stage {
        Stage::Idle => "Press d to ask a question and draw a card".to_string(),
        Stage::WalletRequired => "A wallet is needed to continue".to_string(),
        Stage::Drawing => "Submitting the draw...".to_string(),
        Stage::AwaitingRedirect if snap.question.is_none() => {
            "Press d and enter the question you asked for this draw".to_string()
        }
        Stage::AwaitingRedirect => "Waiting for the draw transaction...".to_string(),
        Stage::Resolving => "Reading the transaction outcome...".to_string(),
        Stage::GeneratingReading => "Consulting the cards...".to_string(),
        Stage::ReadingReady | Stage::Minting | Stage::Minted => String::new(),
        Stage::Error if snap.can_retry => "Press r to try again or n to start again".to_string(),
        Stage::Error => "Press n to start again".to_string(),
    }
}

fn draw_status(f: &mut Frame, area: Rect, snap: &ViewSnapshot) {
    let widget = match &snap.failure {
        Some(failure) => Paragraph::new(vec![
            Line::from(failure.headline()).style(Style::default().add_modifier(Modifier::BOLD)),
            Line::from(failure.message.clone()),
        ])
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Error"))
        .style(Style::default().fg(Color::Red)),
        None => {
            let mut lines = vec![Line::from(snap.status.clone())];
            for e in &snap.errors {
                lines.push(Line::from(e.clone()).style(Style::default().fg(Color::Red)));
            }
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(Color::Green))
        }
    };
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &ViewSnapshot) {
    let text = match snap.stage {
        Stage::ReadingReady => "m mint reading | n new reading | w sign in | x sign out | q quit",
        Stage::Error if snap.can_retry => {
            "r retry | n new reading | w sign in | x sign out | q quit"
        }
        Stage::Minted | Stage::Error => "n new reading | w sign in | x sign out | q quit",
        Stage::WalletRequired => "w sign in | Esc back | q quit",
        _ => "d ask & draw | w sign in | x sign out | q quit",
    };
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_wallet_overlay(f: &mut Frame, snap: &ViewSnapshot) {
    let area = centered_rect(50, 25, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Wallet Required")
        .style(Style::default().fg(Color::Yellow));
    let hint = if snap.known_accounts.is_empty() {
        "No key files found for this network.\nLog in with the NEAR CLI first."
    } else {
        "Press w to choose an account, Esc to go back."
    };
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(hint), block.inner(area));
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &ViewSnapshot) {
    match &state.mode {
        Mode::QuestionModal(input) => {
            let area = centered_rect(60, 20, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Ask the Cards");
            let p = Paragraph::new(format!(
                "{}_\nEnter=confirm Esc=cancel",
                input.text
            ))
            .wrap(Wrap { trim: false });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::AccountModal(acc) => {
            let area = centered_rect(50, 40, f.area());
            let block = Block::default().borders(Borders::ALL).title("Sign In");
            let mut lines = Vec::new();
            if snap.known_accounts.is_empty() {
                lines.push(Line::from("No key files found"));
            } else {
                for (i, name) in snap.known_accounts.iter().enumerate() {
                    let cur = if i == acc.idx { ">" } else { " " };
                    lines.push(Line::from(format!("{cur} {name}")));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Enter=sign in Esc=cancel ↑/↓ select"));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the reader? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

/// The card face as text, turned upside down when the transform says so.
pub fn card_face_lines(card: &str, transform: ImageTransform) -> Vec<String> {
    let inner = CARD_WIDTH - 2;
    let mut lines = Vec::with_capacity(CARD_HEIGHT);
    lines.push(format!("┌{}┐", "─".repeat(inner)));
    lines.push(framed("◇", inner));
    let words = wrap_words(card, inner - 2);
    let top_pad = (CARD_HEIGHT - 4).saturating_sub(words.len()) / 2;
    for _ in 0..top_pad {
        lines.push(framed("", inner));
    }
    for word_line in &words {
        lines.push(framed(word_line, inner));
    }
    while lines.len() < CARD_HEIGHT - 2 {
        lines.push(framed("", inner));
    }
    lines.push(framed("◇", inner));
    lines.push(format!("└{}┘", "─".repeat(inner)));

    if transform.is_rotated() {
        lines.reverse();
        for line in &mut lines {
            *line = line.chars().rev().map(flip_char).collect();
        }
    }
    lines
}

fn card_back_lines() -> Vec<String> {
    let inner = CARD_WIDTH - 2;
    let mut lines = vec![format!("┌{}┐", "─".repeat(inner))];
    for row in 0..CARD_HEIGHT - 2 {
        let pattern = if row % 2 == 0 { "░▒" } else { "▒░" };
        lines.push(format!("│{}│", pattern.repeat(inner / 2 + 1).chars().take(inner).collect::<String>()));
    }
    lines.push(format!("└{}┘", "─".repeat(inner)));
    lines
}

fn framed(text: &str, inner: usize) -> String {
    let width = text.width();
    let left = inner.saturating_sub(width) / 2;
    let right = inner.saturating_sub(width + left);
    format!("│{}{}{}│", " ".repeat(left), text, " ".repeat(right))
}

fn wrap_words(text: &str, max: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word: String = truncate_to_width(word, max);
        if !current.is_empty() && current.width() + 1 + word.width() > max {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate_to_width(word: &str, max: usize) -> String {
    let mut out = String::new();
    let mut width = 0;
    for c in word.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > max {
            break;
        }
        width += w;
        out.push(c);
    }
    out
}

fn flip_char(c: char) -> char {
    match c {
        '┌' => '┘',
        '┐' => '└',
        '└' => '┐',
        '┘' => '┌',
        other => other,
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
