//! Live terminal preview: the output image downsampled onto braille cells.

use crate::colour::Pixel;
use crate::composite::OutputImage;
use crate::sink::FrameSink;
use anyhow::Result;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Stdout, Write};

/// Dots are lit where the sampled pixel is at least this bright.
pub const DEFAULT_THRESHOLD: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: (u8, u8, u8),
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: (255, 255, 255),
        }
    }
}

fn braille_bit(dx: usize, dy: usize) -> u8 {
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

fn luminance(p: Pixel) -> f32 {
    (0.2126 * p.r as f32 + 0.7152 * p.g as f32 + 0.0722 * p.b as f32) / 255.0
}

/// Maps the image onto `cols x rows` cells of 2x4 dots each, nearest
/// neighbour. A cell's colour is the mean of its lit dots.
pub(crate) fn rasterize(image: &OutputImage, cols: u16, rows: u16, threshold: f32) -> Vec<Cell> {
    let (cols, rows) = (cols as usize, rows as usize);
    let mut cells = vec![Cell::default(); cols * rows];
    if cols == 0 || rows == 0 || image.width() == 0 || image.height() == 0 {
        return cells;
    }
    let (dots_w, dots_h) = (cols * 2, rows * 4);

    for cy in 0..rows {
        for cx in 0..cols {
            let mut mask = 0u8;
            let (mut r, mut g, mut b, mut lit) = (0u32, 0u32, 0u32, 0u32);
            for dy in 0..4 {
                for dx in 0..2 {
                    let sx = (cx * 2 + dx) * image.width() / dots_w;
                    let sy = (cy * 4 + dy) * image.height() / dots_h;
                    let p = image.pixel(sx, sy);
                    if luminance(p) >= threshold {
                        mask |= braille_bit(dx, dy);
                        r += p.r as u32;
                        g += p.g as u32;
                        b += p.b as u32;
                        lit += 1;
                    }
                }
            }
            let cell = &mut cells[cy * cols + cx];
            cell.ch = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
            if lit > 0 {
                cell.fg = ((r / lit) as u8, (g / lit) as u8, (b / lit) as u8);
            }
        }
    }
    cells
}

pub struct TerminalPreview {
    out: Stdout,
    cols: u16,
    rows: u16,
    prev: Vec<Cell>,
    threshold: f32,
    status: String,
    active: bool,
}

impl TerminalPreview {
    pub fn begin() -> Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;
        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
            status: String::new(),
            active: true,
        })
    }

    pub fn end(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn resize_if_needed(&mut self) -> Result<()> {
        let (c, r) = terminal::size()?;
        if c != self.cols || r != self.rows {
            self.cols = c;
            self.rows = r;
            self.prev.clear();
            queue!(self.out, Clear(ClearType::All))?;
        }
        Ok(())
    }

    fn draw(&mut self, cells: &[Cell], art_rows: u16) -> Result<()> {
        let diff_only = self.prev.len() == cells.len();
        let mut last_fg = None;
        queue!(self.out, SetBackgroundColor(Color::Black))?;
        for y in 0..art_rows {
            for x in 0..self.cols {
                let i = y as usize * self.cols as usize + x as usize;
                let c = cells[i];
                if diff_only && c == self.prev[i] {
                    continue;
                }
                queue!(self.out, cursor::MoveTo(x, y))?;
                if last_fg != Some(c.fg) {
                    let (r, g, b) = c.fg;
                    queue!(self.out, SetForegroundColor(Color::Rgb { r, g, b }))?;
                    last_fg = Some(c.fg);
                }
                queue!(self.out, Print(c.ch))?;
            }
        }
        self.prev.clear();
        self.prev.extend_from_slice(cells);
        Ok(())
    }

    fn draw_hud(&mut self, line: &str) -> Result<()> {
        if self.rows == 0 {
            return Ok(());
        }
        let text: String = line.chars().take(self.cols as usize).collect();
        queue!(
            self.out,
            cursor::MoveTo(0, self.rows - 1),
            SetForegroundColor(Color::Grey),
            SetBackgroundColor(Color::Black),
            Clear(ClearType::CurrentLine),
            Print(text)
        )?;
        Ok(())
    }
}

impl FrameSink for TerminalPreview {
    fn present(&mut self, index: u64, image: &OutputImage) -> Result<()> {
        self.resize_if_needed()?;
        // bottom row is the HUD
        let art_rows = self.rows.saturating_sub(1);
        let cells = rasterize(image, self.cols, art_rows, self.threshold);

        queue!(self.out, BeginSynchronizedUpdate)?;
        self.draw(&cells, art_rows)?;
        let hud = format!(
            " frame {index}  {}x{}  [space] pause  [q] quit  {}",
            image.width(),
            image.height(),
            self.status
        );
        self.draw_hud(&hud)?;
        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        let _ = self.end();
    }
}
