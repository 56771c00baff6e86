use shared::{
    ConnectInfo, StateLine, BALL_SIZE, LEFT_PADDLE_X, PADDLE_HEIGHT, PADDLE_WIDTH, RIGHT_PADDLE_X,
};

/// Draws the court as text, scaled down from screen pixels to character cells.
pub struct Renderer {
    width: i32,
    height: i32,
    cols: usize,
    rows: usize,
}

impl Renderer {
    pub fn new(info: &ConnectInfo, cols: usize, rows: usize) -> Self {
        Renderer {
            width: info.width.max(1),
            height: info.height.max(1),
            cols: cols.max(8),
            rows: rows.max(4),
        }
    }

    pub fn render(&self, state: &StateLine) -> String {
        let mut grid = vec![vec![' '; self.cols]; self.rows];

        self.fill(&mut grid, LEFT_PADDLE_X, state.left_paddle_y, PADDLE_WIDTH, PADDLE_HEIGHT, '|');
        self.fill(&mut grid, RIGHT_PADDLE_X, state.right_paddle_y, PADDLE_WIDTH, PADDLE_HEIGHT, '|');
        self.fill(&mut grid, state.ball_x, state.ball_y, BALL_SIZE, BALL_SIZE, 'o');

        let border = format!("+{}+", "-".repeat(self.cols));
        let mut out = String::with_capacity((self.cols + 3) * (self.rows + 3));
        out.push_str(&status_line(state));
        out.push('\n');
        out.push_str(&border);
        out.push('\n');
        for row in grid {
            out.push('|');
            out.extend(row);
            out.push_str("|\n");
        }
        out.push_str(&border);
        out
    }

    fn fill(&self, grid: &mut [Vec<char>], x: i32, y: i32, w: i32, h: i32, c: char) {
        // Off-court objects (a ball that just scored) are not drawn.
        if x + w <= 0 || x >= self.width || y + h <= 0 || y >= self.height {
            return;
        }

        let col_of = |px: i32| px.clamp(0, self.width - 1) as usize * self.cols / self.width as usize;
        let row_of = |py: i32| py.clamp(0, self.height - 1) as usize * self.rows / self.height as usize;

        for row in row_of(y)..=row_of(y + h - 1) {
            for col in col_of(x)..=col_of(x + w - 1) {
                grid[row][col] = c;
            }
        }
    }
}

/// One-line summary of a state, used when the court is not drawn.
pub fn status_line(state: &StateLine) -> String {
    format!(
        "{:>2} : {:<2}  ball ({:>3}, {:>3})  paddles L{:>3} R{:>3}",
        state.left_score,
        state.right_score,
        state.ball_x,
        state.ball_y,
        state.left_paddle_y,
        state.right_paddle_y
    )
}
