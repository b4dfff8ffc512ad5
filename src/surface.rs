// Terminal rendering of the joystick and telemetry widgets
//
// Pointer space uses one unit per terminal column horizontally and
// `cell_aspect` units per row vertically, so the half-disk looks round.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

use crate::config::CommandMode;
use crate::drive::{JoystickGeometry, StickState};
use crate::panel::{GestureState, Panel};

/// Rows reserved under the joystick for widgets
pub const WIDGET_ROWS: u16 = 7;

const BAR_WIDTH: usize = 20;

const DISK_FILL: char = '.';
const DISK_RING: char = 'o';
const HALF_RING: char = ':';
const FORWARD_GUIDE: char = '|';
const BASE_LINE: char = '-';
const TRAIL: char = '*';
const STICK: char = '@';

pub struct Surface {
    cell_aspect: f64,
}

impl Surface {
    pub fn new(cell_aspect: f64) -> Self {
        Self { cell_aspect }
    }

    /// Joystick container size in pointer units for a terminal size
    pub fn container(&self, columns: u16, rows: u16) -> (f64, f64) {
        let joystick_rows = rows.saturating_sub(WIDGET_ROWS);
        (
            f64::from(columns),
            f64::from(joystick_rows) * self.cell_aspect,
        )
    }

    /// Pointer coordinate at the center of a terminal cell
    pub fn pointer(&self, column: u16, row: u16) -> (f64, f64) {
        (
            f64::from(column) + 0.5,
            (f64::from(row) + 0.5) * self.cell_aspect,
        )
    }

    /// Render the whole screen as one string per terminal row
    pub fn compose(&self, panel: &Panel, columns: u16, rows: u16) -> Vec<String> {
        let width = usize::from(columns);
        let joystick_rows = rows.saturating_sub(WIDGET_ROWS);

        let mut lines: Vec<String> = (0..joystick_rows)
            .map(|row| {
                (0..columns)
                    .map(|column| self.cell(panel, column, row))
                    .collect()
            })
            .collect();

        lines.extend(widgets(panel));
        lines.truncate(usize::from(rows));
        for line in &mut lines {
            fit(line, width);
        }
        lines
    }

    /// Write a composed frame to the terminal
    pub fn draw<W: Write>(
        &self,
        out: &mut W,
        panel: &Panel,
        columns: u16,
        rows: u16,
    ) -> io::Result<()> {
        for (row, line) in self.compose(panel, columns, rows).iter().enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            queue!(out, MoveTo(0, row), Print(line), Clear(ClearType::UntilNewLine))?;
        }
        out.flush()
    }

    fn cell(&self, panel: &Panel, column: u16, row: u16) -> char {
        let Some(geometry) = panel.geometry() else {
            return ' ';
        };
        let (x, y) = self.pointer(column, row);
        // Half a cell in pointer units
        let tolerance = 0.5 * self.cell_aspect.max(1.0);

        if let Some(stick) = panel.stick() {
            let cursor = (geometry.radius / 10.0).max(tolerance);
            if (x - stick.stick_x).hypot(y - stick.stick_y) <= cursor {
                return STICK;
            }
            if panel.gesture() == GestureState::Dragging
                && on_trail(geometry, stick, x, y, tolerance)
            {
                return TRAIL;
            }
        }

        background(geometry, x, y, tolerance)
    }
}

fn background(geometry: &JoystickGeometry, x: f64, y: f64, tolerance: f64) -> char {
    let distance = geometry.distance(x, y);
    if y > geometry.origin_y + tolerance || distance > geometry.radius + tolerance {
        return ' ';
    }
    if (y - geometry.origin_y).abs() <= tolerance {
        return BASE_LINE;
    }
    if (distance - geometry.radius).abs() <= tolerance {
        return DISK_RING;
    }
    if (distance - geometry.radius / 2.0).abs() <= tolerance {
        return HALF_RING;
    }
    if (x - geometry.origin_x).abs() <= 0.5 {
        return FORWARD_GUIDE;
    }
    DISK_FILL
}

/// Whether (x, y) lies on the segment from the origin to the stick's extent
fn on_trail(
    geometry: &JoystickGeometry,
    stick: &StickState,
    x: f64,
    y: f64,
    tolerance: f64,
) -> bool {
    let (ax, ay) = (geometry.origin_x, geometry.origin_y);
    let (dx, dy) = (stick.extent_x - ax, stick.extent_y - ay);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return false;
    }
    let t = (((x - ax) * dx + (y - ay) * dy) / length_sq).clamp(0.0, 1.0);
    (x - (ax + t * dx)).hypot(y - (ay + t * dy)) <= tolerance
}

fn widgets(panel: &Panel) -> Vec<String> {
    let command = panel.command();
    let mut lines = vec![String::new()];

    lines.push(format!(
        "Speed        {:>3}       {}",
        command.speed,
        bar(u32::from(command.speed))
    ));
    lines.push(match panel.config().command_mode {
        CommandMode::Differential => format!(
            "Duty         L {:>3}  R {:>3}  angle {:>4}",
            command.duty_left, command.duty_right, command.angle_deg
        ),
        CommandMode::Legacy => format!("Mode         legacy (L{})", command.speed),
    });

    lines.push(match panel.battery() {
        Some(battery) => format!(
            "Battery      {:<9} {} {:>3}%",
            battery.display_voltage(),
            bar(u32::from(battery.level_percent)),
            battery.level_percent
        ),
        None => "Battery      --".to_string(),
    });

    match panel.currents() {
        Some(currents) => {
            lines.push(format!(
                "Left motor   {:<9} {} {:>3}%",
                currents.display_left(),
                bar(currents.left_level_percent),
                currents.left_level_percent
            ));
            lines.push(format!(
                "Right motor  {:<9} {} {:>3}%",
                currents.display_right(),
                bar(currents.right_level_percent),
                currents.right_level_percent
            ));
        }
        None => {
            lines.push("Left motor   --".to_string());
            lines.push("Right motor  --".to_string());
        }
    }

    lines.push(format!("{}   (q to quit)", panel.connection().label()));
    lines
}

/// Percentage bar; overflow past 100 fills the bar
fn bar(percent: u32) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

fn fit(line: &mut String, width: usize) {
    let len = line.chars().count();
    if len > width {
        *line = line.chars().take(width).collect();
    } else {
        line.extend(std::iter::repeat_n(' ', width - len));
    }
}
