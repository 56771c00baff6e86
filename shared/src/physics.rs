//! Integer physics primitives for the ball and paddles.
//!
//! Coordinates are screen pixels with the origin in the top-left corner and Y
//! growing downwards. Everything moves a whole number of pixels per tick.

use crate::{
    BALL_SIZE, BALL_SPEED, BALL_START_X, BALL_START_Y, PADDLE_HEIGHT, PADDLE_MAX_Y,
    PADDLE_MIN_Y, PADDLE_SPEED, PADDLE_START_Y, PADDLE_WIDTH,
};

/// Axis-aligned rectangle, top-left anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Horizontal direction of a serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paddle {
    pub rect: Rect,
    pub speed: i32,
}

impl Paddle {
    pub fn new(x: i32) -> Self {
        Self {
            rect: Rect::new(x, PADDLE_START_Y, PADDLE_WIDTH, PADDLE_HEIGHT),
            speed: PADDLE_SPEED,
        }
    }

    /// Moves by `dy` pixels, clamped to the playfield between the walls.
    pub fn move_by(&mut self, dy: i32) {
        self.rect.y = (self.rect.y + dy).clamp(PADDLE_MIN_Y, PADDLE_MAX_Y);
    }

    pub fn reset(&mut self) {
        self.rect.y = PADDLE_START_Y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub rect: Rect,
    pub vel_x: i32,
    pub vel_y: i32,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            rect: Rect::new(BALL_START_X, BALL_START_Y, BALL_SIZE, BALL_SIZE),
            vel_x: -BALL_SPEED,
            vel_y: 0,
        }
    }
}

impl Ball {
    pub fn update_position(&mut self) {
        self.rect.x += self.vel_x;
        self.rect.y += self.vel_y;
    }

    /// Sends the ball back away from `paddle`, angled by how far from the
    /// paddle's center it struck.
    ///
    /// The horizontal velocity is set rather than negated, so a ball that
    /// overlaps the paddle for several ticks does not rattle back and forth.
    pub fn reflect_off_paddle(&mut self, paddle: &Rect) {
        let speed = self.vel_x.abs().max(1);
        self.vel_x = if paddle.center_x() < self.rect.center_x() {
            speed
        } else {
            -speed
        };
        self.vel_y = (self.rect.center_y() - paddle.center_y()).div_euclid(2);
    }

    /// Vertical bounce off a top or bottom wall.
    pub fn reflect_off_wall(&mut self, wall: &Rect) {
        let speed = self.vel_y.abs();
        self.vel_y = if wall.center_y() < self.rect.center_y() {
            speed
        } else {
            -speed
        };
    }

    pub fn reset_to_center(&mut self, direction: Direction) {
        self.rect.x = BALL_START_X;
        self.rect.y = BALL_START_Y;
        self.vel_x = match direction {
            Direction::Left => -BALL_SPEED,
            Direction::Right => BALL_SPEED,
        };
        self.vel_y = 0;
    }
}
