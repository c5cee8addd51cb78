use crate::display_width::{char_width, max_width};
use crate::model::GeneratedModel;

const HEADERS: [&str; 5] = ["", "field", "type", "constraint", "description"];
const MINIMAL_MARK: &str = "*";

/// Wide characters take two cells; the second holds this and is dropped on
/// output.
const CONTINUATION: char = '\0';

struct Grid {
    cells: Vec<Vec<char>>,
    width: usize,
    height: usize,
}

impl Grid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            width,
            height,
        }
    }

    fn set(&mut self, row: usize, col: usize, ch: char) {
        if row < self.height && col < self.width {
            self.cells[row][col] = ch;
        }
    }

    fn write_str(&mut self, row: usize, col: usize, s: &str) {
        let mut at = col;
        for ch in s.chars() {
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            self.set(row, at, ch);
            for extra in 1..w {
                self.set(row, at + extra, CONTINUATION);
            }
            at += w;
        }
    }

    fn hline(&mut self, row: usize, stops: &[usize], left: char, mid: char, right: char) {
        for col in 0..self.width {
            self.set(row, col, '─');
        }
        for (i, &col) in stops.iter().enumerate() {
            let ch = if i == 0 {
                left
            } else if i == stops.len() - 1 {
                right
            } else {
                mid
            };
            self.set(row, col, ch);
        }
    }

    fn to_string(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                let line: String = row.iter().filter(|&&c| c != CONTINUATION).collect();
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn describe(model: &GeneratedModel) -> String {
    let rows: Vec<[String; 5]> = model
        .fields
        .iter()
        .map(|field| {
            let mark = if model.minimal_fields.contains(&field.name) {
                MINIMAL_MARK
            } else {
                ""
            };
            [
                mark.to_string(),
                field.name.clone(),
                field.field_type.to_string(),
                field.field_type.kind.constraint(),
                field.description.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..HEADERS.len())
        .map(|i| max_width(rows.iter().map(|r| r[i].as_str()), 0).max(HEADERS[i].len()))
        .collect();

    // Column separators sit at these offsets; each cell is padded by one space.
    let mut stops = vec![0];
    for w in &widths {
        let last = stops.last().copied().unwrap_or(0);
        stops.push(last + w + 3);
    }
    let width = stops.last().copied().unwrap_or(0) + 1;
    let height = rows.len() + 4;
    let mut grid = Grid::new(width, height);

    grid.hline(0, &stops, '┌', '┬', '┐');
    draw_row(&mut grid, 1, &stops, &HEADERS.map(String::from));
    grid.hline(2, &stops, '├', '┼', '┤');
    for (i, row) in rows.iter().enumerate() {
        draw_row(&mut grid, 3 + i, &stops, row);
    }
    grid.hline(height - 1, &stops, '└', '┴', '┘');

    format!(
        "{} ({})\n{}\n",
        model.type_name,
        model.table,
        grid.to_string()
    )
}

fn draw_row(grid: &mut Grid, row: usize, stops: &[usize], cells: &[String; 5]) {
    for &col in stops {
        grid.set(row, col, '│');
    }
    for (cell, &col) in cells.iter().zip(stops) {
        grid.write_str(row, col + 2, cell);
    }
}
