use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::{
    DefaultTerminal,
    buffer::Buffer,
    crossterm::event::{
        Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind, poll, read,
    },
    layout::Flex,
    prelude::*,
    widgets::{Block, Clear, Padding, Paragraph},
};
use ratatui_explorer::{FileExplorer, Theme};
use ratatui::widgets::WidgetRef;
use std::{cell::RefCell, io, rc::Rc, time::Duration};

use waveplayer::{
    EventKind, MountPoint, PartialOptions, PixelSurface, PlayerEvent, PlayerHandle, PlayerManager,
    RodioMedia, Rgba, WaveformStyle, format_time, source::DefaultFetcher,
};

const MOUNT: &str = "main";
/// Raster height used when the config doesn't set one: eight rows of half blocks.
const TERMINAL_HEIGHT: f32 = 16.0;
const FRAME: Duration = Duration::from_millis(16);
const SEEK_STEP: f64 = 5.0;
const VOLUME_STEP: f32 = 0.1;
const RATE_STEP: f32 = 0.25;

fn to_color(rgba: Rgba) -> Color {
    Color::Rgb(rgba.r, rgba.g, rgba.b)
}

/// Shows a player's raster with one half-block cell per two vertical pixels.
struct WaveformView<'a> {
    surface: &'a PixelSurface,
    background: Rgba,
    opacity: f32,
}

impl Widget for WaveformView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for col in 0..area.width {
                let x = u32::from(col);
                let y = u32::from(row) * 2;
                let top = self.surface.composite(x, y, self.background, self.opacity);
                let bottom = self.surface.composite(x, y + 1, self.background, self.opacity);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_char('▀')
                        .set_fg(to_color(top))
                        .set_bg(to_color(bottom));
                }
            }
        }
    }
}

struct App {
    explorer: FileExplorer,
    manager: PlayerManager,
    player: PlayerHandle,
    show_explorer: bool,
    status: Rc<RefCell<String>>,
    waveform_area: Rect,
}

impl App {
    fn new(explorer: FileExplorer, manager: PlayerManager, player: PlayerHandle) -> Self {
        let status = Rc::new(RefCell::new(String::new()));
        {
            let mut controller = player.borrow_mut();
            let on_error = Rc::clone(&status);
            controller.subscribe(EventKind::Error, move |event, _| {
                if let PlayerEvent::Error(err) = event {
                    *on_error.borrow_mut() = err.to_string();
                }
            });
            let on_load = Rc::clone(&status);
            controller.subscribe(EventKind::Load, move |_, _| on_load.borrow_mut().clear());
            let on_end = Rc::clone(&status);
            controller.subscribe(EventKind::End, move |_, _| {
                *on_end.borrow_mut() = "finished".to_string();
            });
        }

        Self {
            explorer,
            manager,
            player,
            show_explorer: false,
            status,
            waveform_area: Rect::default(),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let rows = {
            let player = self.player.borrow();
            (player.options().height / 2.0).ceil() as u16
        };
        let [header, waveform, footer, help] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(rows + 2),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let block = Block::bordered();
        let inner = block.inner(waveform);
        if inner.width != self.waveform_area.width {
            self.manager.resize_mount(MOUNT, f32::from(inner.width), 1.0);
        }
        self.waveform_area = inner;

        let player = self.player.borrow();
        let options = player.options();
        let view = player.view();
        let text = Style::default().fg(to_color(options.text_color));
        let secondary = Style::default().fg(to_color(options.text_secondary_color));

        let mut title = vec![Span::styled(view.title.clone(), text.bold())];
        if let Some(bpm) = view.bpm.filter(|_| options.show_bpm) {
            title.push(Span::styled(format!("  {bpm:.0} BPM"), secondary));
        }
        let mut lines = vec![Line::from(title)];
        if let Some(subtitle) = &view.subtitle {
            lines.push(Line::styled(subtitle.clone(), secondary));
        }
        f.render_widget(
            Paragraph::new(lines).block(Block::default().padding(Padding::horizontal(1))),
            header,
        );

        f.render_widget(block, waveform);
        f.render_widget(
            WaveformView {
                surface: player.surface(),
                background: options.background_color,
                opacity: view.surface_opacity,
            },
            inner,
        );

        let icon = if !view.button_enabled {
            "✕"
        } else if player.state().is_playing {
            "⏸"
        } else {
            "▶"
        };
        let button = Style::default().fg(to_color(options.button_color));
        let mut status = vec![Span::styled(format!(" {icon} "), button)];
        if options.show_time {
            status.push(Span::styled(
                format!("{} / {}", view.current_time, view.total_time),
                text,
            ));
        }
        status.push(Span::styled(
            format!(
                "  vol {:>3.0}%  x{:.2}  {}",
                player.volume() * 100.0,
                player.playback_rate(),
                options.waveform_style
            ),
            secondary,
        ));
        if view.loading_visible {
            status.push(Span::styled("  loading...", secondary));
        }
        let message = self.status.borrow();
        if !message.is_empty() {
            let error = Style::default().fg(Color::Red);
            status.push(Span::styled(format!("  {message}"), error));
        }
        f.render_widget(Line::from(status), footer);
        f.render_widget(
            Line::styled(
                " space play/pause  ←/→ seek  +/- volume  [/] rate  s style  e files  q quit",
                secondary,
            ),
            help,
        );
        drop(message);
        drop(player);

        if self.show_explorer {
            let area = Self::popup_area(area, 50, 70);
            f.render_widget(Clear, area);
            self.explorer.widget().render_ref(area, f.buffer_mut());
        }
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            self.manager.tick();

            if !poll(FRAME)? {
                continue;
            }
            let event = read()?;
            match event {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('e') => self.show_explorer = !self.show_explorer,
                    KeyCode::Enter if self.show_explorer => self.select_file(),
                    _ if self.show_explorer => {}
                    KeyCode::Char(' ') => self.toggle_play(),
                    KeyCode::Left => self.seek_by(-SEEK_STEP),
                    KeyCode::Right => self.seek_by(SEEK_STEP),
                    KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(VOLUME_STEP),
                    KeyCode::Char('-') => self.change_volume(-VOLUME_STEP),
                    KeyCode::Char(']') => self.change_rate(RATE_STEP),
                    KeyCode::Char('[') => self.change_rate(-RATE_STEP),
                    KeyCode::Char('s') => self.cycle_style(),
                    _ => (),
                },
                Event::Mouse(mouse) if !self.show_explorer => self.handle_mouse(mouse),
                _ => (),
            }
            if self.show_explorer {
                self.explorer.handle(&event)?;
            }
        }
    }

    fn toggle_play(&mut self) {
        if let Err(err) = self.player.borrow_mut().toggle_play() {
            log::warn!("tui: toggle failed: {err}");
        }
    }

    fn seek_by(&mut self, delta: f64) {
        let mut player = self.player.borrow_mut();
        let position = player.state().position_secs;
        if let Err(err) = player.seek_to(position + delta) {
            log::warn!("tui: seek failed: {err}");
        }
    }

    fn change_volume(&mut self, delta: f32) {
        let mut player = self.player.borrow_mut();
        let volume = player.volume();
        player.set_volume(volume + delta);
    }

    fn change_rate(&mut self, delta: f32) {
        let mut player = self.player.borrow_mut();
        let rate = player.playback_rate();
        player.set_playback_rate(rate + delta);
    }

    fn cycle_style(&mut self) {
        let mut player = self.player.borrow_mut();
        let style: WaveformStyle = player.options().waveform_style.next();
        player.set_style(style);
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let area = self.waveform_area;
        if area.contains(Position::new(mouse.column, mouse.row)) {
            let x = f32::from(mouse.column - area.x) + 0.5;
            self.player.borrow_mut().handle_click(x);
        }
    }

    fn select_file(&mut self) {
        let file = self.explorer.current();
        if file.is_dir() {
            return;
        }
        let Some(path) = file.path().to_str().map(str::to_owned) else {
            *self.status.borrow_mut() = "path is not valid UTF-8".to_string();
            return;
        };
        self.show_explorer = false;
        self.load(&path);
    }

    fn load(&mut self, url: &str) {
        *self.status.borrow_mut() = format!("loading {url}");
        let result = self.player.borrow_mut().load(url);
        match result {
            Ok(()) => log::info!("tui: loaded {url} ({})", format_time(self.duration())),
            Err(err) => log::error!("tui: {err}"),
        }
    }

    fn duration(&self) -> f64 {
        self.player.borrow().state().duration_secs.unwrap_or(0.0)
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }
}

/// Run the terminal player. `declared` comes from the config file; `url`, when
/// given, is loaded on the first frame.
pub fn run(declared: PartialOptions, url: Option<String>) -> Result<()> {
    let mut manager = PlayerManager::new();
    let mut declared = declared;
    declared.height.get_or_insert(TERMINAL_HEIGHT);
    manager.register_mount(MountPoint::new(MOUNT, 0.0, 1.0).with_declared(declared));

    let media = RodioMedia::new()?;
    let explicit = PartialOptions {
        url,
        ..Default::default()
    };
    let player = manager.create(MOUNT, explicit, Box::new(media), Rc::new(DefaultFetcher))?;

    let theme = Theme::default()
        .add_default_title()
        .with_item_style(Style::default().fg(Color::Gray));
    let file_explorer = FileExplorer::with_theme(theme)?;

    let terminal = ratatui::init();
    crossterm::execute!(io::stdout(), EnableMouseCapture)?;
    let app_result = App::new(file_explorer, manager, player).run(terminal);
    crossterm::execute!(io::stdout(), DisableMouseCapture)?;
    ratatui::restore();
    app_result
}
