//! Authoritative match simulation.
//!
//! [`Match`] is owned by the tick loop and is the single writer of the match
//! state. Players influence it only through their [`PlayerSlot`]s, which the
//! loop samples once per tick.

use crate::input::{Intent, PlayerSlot};
use crate::rematch::{self, RematchDecision};
use log::info;
use shared::{
    Ball, Direction, Paddle, Rect, StateLine, LEFT_PADDLE_X, RIGHT_PADDLE_X, SCREEN_HEIGHT,
    SCREEN_WIDTH, WALL_MARGIN, WIN_SCORE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Playing,
    WinFrozen,
}

/// Notable transitions produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Reported once per match, on the tick the threshold is reached.
    Won(Side),
    Restarted,
}

/// Read-only copy of the match handed to the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchState {
    pub left_paddle_y: i32,
    pub right_paddle_y: i32,
    pub ball_x: i32,
    pub ball_y: i32,
    pub left_score: i32,
    pub right_score: i32,
    pub phase: Phase,
}

impl MatchState {
    pub fn to_line(&self) -> StateLine {
        StateLine {
            left_paddle_y: self.left_paddle_y,
            right_paddle_y: self.right_paddle_y,
            ball_x: self.ball_x,
            ball_y: self.ball_y,
            left_score: self.left_score,
            right_score: self.right_score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub tick: u32,
    left: Paddle,
    right: Paddle,
    ball: Ball,
    left_score: i32,
    right_score: i32,
    phase: Phase,
    win_score: i32,
    win_recorded: bool,
    top_wall: Rect,
    bottom_wall: Rect,
}

impl Default for Match {
    fn default() -> Self {
        Self::new(WIN_SCORE)
    }
}

impl Match {
    pub fn new(win_score: i32) -> Self {
        Self {
            tick: 0,
            left: Paddle::new(LEFT_PADDLE_X),
            right: Paddle::new(RIGHT_PADDLE_X),
            ball: Ball::default(),
            left_score: 0,
            right_score: 0,
            phase: Phase::Playing,
            win_score: win_score.max(1),
            win_recorded: false,
            top_wall: Rect::new(-10, 0, SCREEN_WIDTH + 20, WALL_MARGIN),
            bottom_wall: Rect::new(
                -10,
                SCREEN_HEIGHT - WALL_MARGIN,
                SCREEN_WIDTH + 20,
                WALL_MARGIN,
            ),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> MatchState {
        MatchState {
            left_paddle_y: self.left.rect.y,
            right_paddle_y: self.right.rect.y,
            ball_x: self.ball.rect.x,
            ball_y: self.ball.rect.y,
            left_score: self.left_score,
            right_score: self.right_score,
            phase: self.phase,
        }
    }

    /// Advances the match by one fixed step.
    pub fn tick(&mut self, left: &PlayerSlot, right: &PlayerSlot) -> Option<MatchEvent> {
        self.tick = self.tick.wrapping_add(1);

        match rematch::poll(self.phase, left, right) {
            RematchDecision::Restart => {
                self.restart();
                return Some(MatchEvent::Restarted);
            }
            RematchDecision::Hold if self.phase == Phase::WinFrozen => return None,
            RematchDecision::Hold => {}
        }

        Self::steer(&mut self.left, left.intent());
        Self::steer(&mut self.right, right.intent());

        self.advance_ball();
        self.check_win()
    }

    fn steer(paddle: &mut Paddle, intent: Intent) {
        match intent {
            Intent::Up => paddle.move_by(-paddle.speed),
            Intent::Down => paddle.move_by(paddle.speed),
            Intent::None => {}
        }
    }

    fn advance_ball(&mut self) {
        self.ball.update_position();

        if self.ball.rect.x > SCREEN_WIDTH {
            self.left_score += 1;
            self.ball.reset_to_center(Direction::Left);
        } else if self.ball.rect.x < 0 {
            self.right_score += 1;
            self.ball.reset_to_center(Direction::Right);
        }

        // Left first: a ball touching both paddles bounces once, off the left.
        if self.ball.rect.intersects(&self.left.rect) {
            self.ball.reflect_off_paddle(&self.left.rect);
        } else if self.ball.rect.intersects(&self.right.rect) {
            self.ball.reflect_off_paddle(&self.right.rect);
        }

        if self.ball.rect.intersects(&self.top_wall) {
            self.ball.reflect_off_wall(&self.top_wall);
        } else if self.ball.rect.intersects(&self.bottom_wall) {
            self.ball.reflect_off_wall(&self.bottom_wall);
        }
    }

    fn check_win(&mut self) -> Option<MatchEvent> {
        let winner = if self.left_score >= self.win_score {
            Side::Left
        } else if self.right_score >= self.win_score {
            Side::Right
        } else {
            return None;
        };

        self.phase = Phase::WinFrozen;
        if self.win_recorded {
            return None;
        }
        self.win_recorded = true;
        info!(
            "{:?} wins {}-{}",
            winner, self.left_score, self.right_score
        );
        Some(MatchEvent::Won(winner))
    }

    fn restart(&mut self) {
        self.left.reset();
        self.right.reset();
        self.ball.reset_to_center(Direction::Left);
        self.left_score = 0;
        self.right_score = 0;
        self.phase = Phase::Playing;
        self.win_recorded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        BALL_SPEED, BALL_START_X, BALL_START_Y, PADDLE_MAX_Y, PADDLE_MIN_Y, PADDLE_START_Y,
    };

    fn slots() -> (PlayerSlot, PlayerSlot) {
        (
            PlayerSlot::new(Side::Left, "alice"),
            PlayerSlot::new(Side::Right, "bob"),
        )
    }

    /// Parks the ball mid-field, moving nowhere, so paddle tests are isolated.
    fn still_ball(game: &mut Match) {
        game.ball.rect.x = BALL_START_X;
        game.ball.rect.y = BALL_START_Y;
        game.ball.vel_x = 0;
        game.ball.vel_y = 0;
    }

    #[test]
    fn test_initial_state() {
        let game = Match::default();
        let state = game.state();
        assert_eq!(state.left_paddle_y, PADDLE_START_Y);
        assert_eq!(state.right_paddle_y, PADDLE_START_Y);
        assert_eq!((state.ball_x, state.ball_y), (BALL_START_X, BALL_START_Y));
        assert_eq!((state.left_score, state.right_score), (0, 0));
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn test_held_intent_moves_every_tick() {
        let mut game = Match::default();
        let (left, right) = slots();
        still_ball(&mut game);

        left.set_intent(Intent::Up);
        right.set_intent(Intent::Down);
        for _ in 0..3 {
            game.tick(&left, &right);
        }

        let state = game.state();
        assert_eq!(state.left_paddle_y, PADDLE_START_Y - 3 * game.left.speed);
        assert_eq!(state.right_paddle_y, PADDLE_START_Y + 3 * game.right.speed);
    }

    #[test]
    fn test_paddles_stay_in_bounds() {
        let (left, right) = slots();
        for (l, r) in [(Intent::Up, Intent::Down), (Intent::Down, Intent::Up)] {
            let mut game = Match::default();
            left.set_intent(l);
            right.set_intent(r);
            for _ in 0..500 {
                still_ball(&mut game);
                game.tick(&left, &right);
                let state = game.state();
                for y in [state.left_paddle_y, state.right_paddle_y] {
                    assert!((PADDLE_MIN_Y..=PADDLE_MAX_Y).contains(&y));
                }
            }
        }
    }

    #[test]
    fn test_ball_past_right_edge_scores_left() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.ball.rect.x = SCREEN_WIDTH - 2;
        game.ball.rect.y = 100;
        game.ball.vel_x = BALL_SPEED;

        game.tick(&left, &right);

        let state = game.state();
        assert_eq!((state.left_score, state.right_score), (1, 0));
        assert_eq!((state.ball_x, state.ball_y), (BALL_START_X, BALL_START_Y));
        assert_eq!(game.ball.vel_x, -BALL_SPEED);
    }

    #[test]
    fn test_ball_past_left_edge_scores_right() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.ball.rect.x = 2;
        game.ball.rect.y = 400;
        game.ball.vel_x = -BALL_SPEED;

        game.tick(&left, &right);

        let state = game.state();
        assert_eq!((state.left_score, state.right_score), (0, 1));
        assert_eq!(game.ball.vel_x, BALL_SPEED);
    }

    #[test]
    fn test_ball_bounces_off_left_paddle() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.ball.rect.x = LEFT_PADDLE_X + 12;
        game.ball.rect.y = PADDLE_START_Y + 20;
        game.ball.vel_x = -BALL_SPEED;

        game.tick(&left, &right);
        assert!(game.ball.vel_x > 0);
        assert_eq!((game.state().left_score, game.state().right_score), (0, 0));
    }

    #[test]
    fn test_overlapping_both_paddles_reflects_off_left_only() {
        let mut game = Match::default();
        let (left, right) = slots();
        // Drag the right paddle next to the left one so one ball touches both.
        game.right.rect.x = LEFT_PADDLE_X + 8;
        game.ball.rect.x = LEFT_PADDLE_X + 6;
        game.ball.rect.y = PADDLE_START_Y + 10;
        game.ball.vel_x = 0;

        game.tick(&left, &right);
        // The left paddle sends the ball right; the right paddle would send it left.
        assert!(game.ball.vel_x > 0);
    }

    #[test]
    fn test_ball_bounces_off_walls() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.ball.rect.y = WALL_MARGIN + 1;
        game.ball.vel_y = -3;

        game.tick(&left, &right);
        assert_eq!(game.ball.vel_y, 3);

        game.ball.rect.y = SCREEN_HEIGHT - WALL_MARGIN - 6;
        game.ball.vel_y = 3;
        game.tick(&left, &right);
        assert_eq!(game.ball.vel_y, -3);
    }

    #[test]
    fn test_win_freezes_and_reports_once() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.left_score = WIN_SCORE - 1;
        game.ball.rect.x = SCREEN_WIDTH;
        game.ball.vel_x = BALL_SPEED;

        assert_eq!(game.tick(&left, &right), Some(MatchEvent::Won(Side::Left)));
        assert_eq!(game.phase(), Phase::WinFrozen);

        let frozen = game.state();
        left.set_intent(Intent::Down);
        for _ in 0..5 {
            assert_eq!(game.tick(&left, &right), None);
        }
        assert_eq!(game.state(), frozen);
    }

    #[test]
    fn test_right_side_can_win() {
        let mut game = Match::new(2);
        let (left, right) = slots();
        game.right_score = 1;
        game.ball.rect.x = 1;
        game.ball.vel_x = -BALL_SPEED;

        assert_eq!(game.tick(&left, &right), Some(MatchEvent::Won(Side::Right)));
    }

    #[test]
    fn test_rematch_resets_everything() {
        let mut game = Match::default();
        let (left, right) = slots();
        game.left_score = WIN_SCORE - 1;
        game.right_score = 3;
        game.left.rect.y = PADDLE_MIN_Y;
        game.ball.rect.x = SCREEN_WIDTH;
        game.ball.vel_x = BALL_SPEED;
        game.tick(&left, &right);
        assert_eq!(game.phase(), Phase::WinFrozen);

        left.set_ready();
        assert_eq!(game.tick(&left, &right), None);
        assert_eq!(game.phase(), Phase::WinFrozen);

        right.set_ready();
        assert_eq!(game.tick(&left, &right), Some(MatchEvent::Restarted));

        let state = game.state();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!((state.left_score, state.right_score), (0, 0));
        assert_eq!((state.left_paddle_y, state.right_paddle_y), (PADDLE_START_Y, PADDLE_START_Y));
        assert_eq!((state.ball_x, state.ball_y), (BALL_START_X, BALL_START_Y));
        assert!(!left.is_ready());
        assert!(!right.is_ready());

        // The next win is reported again.
        game.left_score = WIN_SCORE - 1;
        game.ball.rect.x = SCREEN_WIDTH;
        game.ball.vel_x = BALL_SPEED;
        assert_eq!(game.tick(&left, &right), Some(MatchEvent::Won(Side::Left)));
    }

    #[test]
    fn test_ready_while_playing_changes_nothing() {
        let (left, right) = slots();
        let mut with_ready = Match::default();
        let mut without = Match::default();

        for _ in 0..30 {
            left.set_ready();
            right.set_ready();
            with_ready.tick(&left, &right);
        }
        let (quiet_left, quiet_right) = slots();
        for _ in 0..30 {
            without.tick(&quiet_left, &quiet_right);
        }

        assert_eq!(with_ready.state(), without.state());
        assert_eq!(with_ready.phase(), Phase::Playing);
    }
}
