//! Band - Formation setup and movement commands
//!
//! The band owns every player plus the time of the last scripted command.
//! Each movement command appends path segments (and speed commands) to all
//! players in one pass, then moves the command cursor forward.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::drill::geometry::{cosd, sind, Pose, Vec2};
use crate::drill::player::{check_angle, check_beats, Player, PlayerMark, PlayerSnapshot, Resolved, PIVOT_RADIUS};
use crate::error::{DrillError, Result};

/// Default length of a bend, in beats
pub const DEFAULT_BEND_BEATS: f64 = 16.0;
/// Default length of an in-place turn, in beats
pub const DEFAULT_TURN_BEATS: f64 = 2.0;
/// Default length of an American counter, in beats
pub const DEFAULT_COUNTER_BEATS: f64 = 16.0;

/// Band configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub rows: usize,
    pub columns: usize,
    /// Distance between consecutive rows
    pub row_separation: f64,
    /// Distance between consecutive columns
    pub column_separation: f64,
    /// Nominal stride length (distance per beat)
    pub stride: f64,
    /// Centre of the first row
    pub origin: Vec2,
    /// Starting direction of all players, in degrees
    pub angle: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 5,
            row_separation: 1.6,
            column_separation: 1.6,
            stride: 0.8,
            origin: Vec2::zero(),
            angle: 0.0,
        }
    }
}

impl BandConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BandConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty formations, a non-positive stride and negative spacing
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(DrillError::InvalidConfig(format!(
                "band needs at least one row and one column, got {}x{}",
                self.rows, self.columns
            )));
        }
        if !self.stride.is_finite() || self.stride <= 0.0 {
            return Err(DrillError::InvalidConfig(format!(
                "stride must be positive, got {}",
                self.stride
            )));
        }
        for (name, sep) in [
            ("row separation", self.row_separation),
            ("column separation", self.column_separation),
        ] {
            if !sep.is_finite() || sep < 0.0 {
                return Err(DrillError::InvalidConfig(format!(
                    "{name} must be non-negative, got {sep}"
                )));
            }
        }
        if !(self.origin.x.is_finite() && self.origin.y.is_finite() && self.angle.is_finite()) {
            return Err(DrillError::InvalidConfig(
                "origin and angle must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Starting pose of the player at (`row`, `column`)
    pub fn start_pose(&self, row: usize, column: usize) -> Pose {
        let c = (column as f64 + 1.0 - (self.columns as f64 + 1.0) / 2.0) * self.column_separation;
        let r = row as f64 * self.row_separation;
        let (s, co) = (sind(self.angle), cosd(self.angle));
        let offset = Vec2::new(s * c - co * r, -co * c - s * r);
        Pose::new(self.origin + offset, self.angle)
    }
}

/// What a command does to the `start_equal` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Leave the flag as it is
    Unchanged,
    /// All paths now end level (bends, counters)
    Level,
    /// Rows are back to their staggered formation
    Staggered,
}

/// Band-wide facts handed to each per-player step of a command
#[derive(Debug, Clone, Copy)]
pub struct ManeuverContext {
    /// Time the command starts at (the band's last command time)
    pub start_time: f64,
    /// Whether the paths already end level, so no catch-up is needed
    pub start_equal: bool,
    pub rows: usize,
    pub columns: usize,
    /// Spacing copied from [`BandConfig`]
    pub row_separation: f64,
    pub column_separation: f64,
}

impl ManeuverContext {
    /// Extend the path of rows behind the first up to the front row's spot,
    /// unless the paths already end level.
    ///
    /// No speed command is added: the rear row walks this stretch on the
    /// schedule of whatever follows, so it reaches the maneuver later.
    pub fn catch_up(&self, player: &mut Player) -> Result<()> {
        if player.row() > 0 && !self.start_equal {
            let beats = player.row() as f64 * self.row_separation / player.stride();
            player.append_straight(self.start_time, beats)?;
        }
        Ok(())
    }

    /// Bend radius for a wheel: the file on the inside of the bend pivots,
    /// the others fan out by the column separation
    pub fn wheel_radius(&self, column: usize, angle: f64) -> f64 {
        let files_inside = if angle < 0.0 {
            column
        } else {
            self.columns - column - 1
        };
        let radius = files_inside as f64 * self.column_separation;
        if radius == 0.0 {
            PIVOT_RADIUS
        } else {
            radius
        }
    }
}

/// The whole formation
#[derive(Debug, Clone)]
pub struct Band {
    config: BandConfig,
    /// Row-major: every column of row 0, then row 1, ...
    players: Vec<Player>,
    /// Time of the last pose query
    time: f64,
    last_command_time: f64,
    start_equal: bool,
}

impl Band {
    /// Lay out the formation described by `config`, everyone at time 0
    pub fn new(config: BandConfig) -> Result<Self> {
        config.validate()?;

        let mut players = Vec::with_capacity(config.rows * config.columns);
        for row in 0..config.rows {
            for column in 0..config.columns {
                let start = config.start_pose(row, column);
                players.push(Player::new(row, column, start, config.stride));
            }
        }

        log::info!(
            "Band formed with {} rows x {} columns",
            config.rows, config.columns
        );
        Ok(Self {
            config,
            players,
            time: 0.0,
            last_command_time: 0.0,
            start_equal: false,
        })
    }

    /// Positional form of [`Band::new`]
    pub fn create(
        rows: usize,
        columns: usize,
        row_separation: f64,
        column_separation: f64,
        stride: f64,
        origin: Vec2,
        angle: f64,
    ) -> Result<Self> {
        Self::new(BandConfig {
            rows,
            columns,
            row_separation,
            column_separation,
            stride,
            origin,
            angle,
        })
    }

    /// Formation the band was created from
    pub fn config(&self) -> &BandConfig {
        &self.config
    }

    /// All players, row-major
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Player currently marching in (`row`, `column`)
    pub fn player(&self, row: usize, column: usize) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.row() == row && p.column() == column)
    }

    /// Time of the last pose query
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time up to which the choreography has been scripted
    pub fn last_command_time(&self) -> f64 {
        self.last_command_time
    }

    /// Whether every row's path currently ends level with the front row
    pub fn start_equal(&self) -> bool {
        self.start_equal
    }

    fn context(&self) -> ManeuverContext {
        ManeuverContext {
            start_time: self.last_command_time,
            start_equal: self.start_equal,
            rows: self.config.rows,
            columns: self.config.columns,
            row_separation: self.config.row_separation,
            column_separation: self.config.column_separation,
        }
    }

    /// Run `f`, undoing every path, command and cursor change if it fails
    fn transaction<F>(&mut self, f: F) -> Result<f64>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let marks: Vec<PlayerMark> = self.players.iter().map(Player::mark).collect();
        let last_command_time = self.last_command_time;
        let start_equal = self.start_equal;

        match f(self) {
            Ok(()) => Ok(self.last_command_time),
            Err(e) => {
                for (player, mark) in self.players.iter_mut().zip(marks) {
                    player.rollback(mark);
                }
                self.last_command_time = last_command_time;
                self.start_equal = start_equal;
                Err(e)
            }
        }
    }

    /// Apply `step` to every player and advance the cursor to the latest
    /// end time any step reports
    fn run<F>(&mut self, ctx: ManeuverContext, alignment: Alignment, mut step: F) -> Result<()>
    where
        F: FnMut(&ManeuverContext, &mut Player) -> Result<f64>,
    {
        let mut end_time = self.last_command_time;
        for player in &mut self.players {
            end_time = end_time.max(step(&ctx, player)?);
        }
        self.last_command_time = end_time;

        match alignment {
            Alignment::Unchanged => {}
            Alignment::Level => self.start_equal = true,
            Alignment::Staggered => self.start_equal = false,
        }
        Ok(())
    }

    /// Script a custom command.
    ///
    /// `step` is called once per player and returns the time that player's
    /// part ends. The command is all or nothing: if any step fails, no
    /// player keeps what was appended. Returns the new last command time.
    pub fn compose<F>(&mut self, alignment: Alignment, step: F) -> Result<f64>
    where
        F: FnMut(&ManeuverContext, &mut Player) -> Result<f64>,
    {
        let ctx = self.context();
        self.transaction(|band| band.run(ctx, alignment, step))
    }

    /// Everyone walks straight on for `beats`
    pub fn march(&mut self, beats: f64) -> Result<f64> {
        check_beats(beats)?;
        log::debug!("march: {} beats from t={}", beats, self.last_command_time);
        self.compose(Alignment::Unchanged, |ctx, player| {
            player.append_straight(ctx.start_time, beats)
        })
    }

    /// Wheel the band through `angle` degrees (positive to the right)
    pub fn bend(&mut self, angle: f64, beats: f64) -> Result<f64> {
        self.bend_with(angle, beats, false)
    }

    /// [`Band::bend`], with `same_start` asserting that the paths already end
    /// level so rear rows need no catch-up
    pub fn bend_with(&mut self, angle: f64, beats: f64, same_start: bool) -> Result<f64> {
        check_beats(beats)?;
        check_angle(angle)?;
        log::debug!(
            "bend: {} deg over {} beats from t={}",
            angle, beats, self.last_command_time
        );
        let mut ctx = self.context();
        ctx.start_equal |= same_start;
        self.transaction(|band| {
            band.run(ctx, Alignment::Level, |ctx, player| {
                ctx.catch_up(player)?;
                let radius = ctx.wheel_radius(player.column(), angle);
                player.append_bend(radius, ctx.start_time, angle, beats)
            })
        })
    }

    /// Every player turns on the spot through `angle` degrees
    pub fn turn(&mut self, angle: f64, beats: f64) -> Result<f64> {
        check_beats(beats)?;
        check_angle(angle)?;
        log::debug!(
            "turn: {} deg over {} beats from t={}",
            angle, beats, self.last_command_time
        );
        self.compose(Alignment::Unchanged, |ctx, player| {
            player.append_bend(PIVOT_RADIUS, ctx.start_time, angle, beats)
        })
    }

    /// Files mirror left to right. Only counter-marches do this.
    fn cross_files(&mut self) {
        let columns = self.config.columns;
        for player in &mut self.players {
            player.set_column(columns - player.column() - 1);
        }
    }

    /// Tight 180 degree turn to the right, after which the files have
    /// crossed over
    pub fn english_counter(&mut self) -> Result<f64> {
        let radius = 0.25 * self.config.column_separation;
        log::debug!(
            "english counter: radius {} from t={}",
            radius, self.last_command_time
        );
        let ctx = self.context();
        self.transaction(|band| {
            band.run(ctx, Alignment::Level, |ctx, player| {
                let beats = radius * PI / player.stride();
                ctx.catch_up(player)?;
                player.append_bend(radius, ctx.start_time, 180.0, beats)
            })?;
            band.cross_files();
            Ok(())
        })
    }

    /// Files left of (and at) the centre turn right, the others turn left,
    /// nesting their half circles around the centre
    pub fn american_counter(&mut self, beats: f64) -> Result<f64> {
        check_beats(beats)?;
        log::debug!(
            "american counter: {} beats from t={}",
            beats, self.last_command_time
        );
        let centre = self.config.columns.div_ceil(2) - 1;
        let half_sep = self.config.column_separation / 2.0;
        self.compose(Alignment::Level, |ctx, player| {
            ctx.catch_up(player)?;
            let column = player.column();
            let offset = column.abs_diff(centre) as f64 * 2.0;
            let (angle, radius) = if column <= centre {
                (180.0, (offset + 0.5) * half_sep)
            } else {
                (-180.0, (offset - 0.5) * half_sep)
            };
            player.append_bend(radius, ctx.start_time, angle, beats)
        })
    }

    /// Restore the row spacing after a bend: front rows walk on until the
    /// rear rows have closed up. No-op unless the paths end level.
    pub fn quick_march_return(&mut self) -> Result<f64> {
        if !self.start_equal {
            log::warn!("quick march return ignored: rows are already staggered");
            return Ok(self.last_command_time);
        }
        log::debug!("quick march return from t={}", self.last_command_time);
        self.compose(Alignment::Staggered, |ctx, player| {
            let rows_behind = (ctx.rows - player.row() - 1) as f64;
            let beats = rows_behind * ctx.row_separation / player.stride();
            player.append_straight(ctx.start_time, beats)
        })
    }

    fn resolve_all<F>(&self, resolve: F) -> Result<Vec<Resolved>>
    where
        F: Fn(&Player) -> Result<Resolved>,
    {
        self.players.iter().map(resolve).collect()
    }

    fn apply_all(&mut self, resolved: Vec<Resolved>) {
        for (player, state) in self.players.iter_mut().zip(resolved) {
            player.apply(state);
        }
    }

    /// Place every player at absolute `time`
    pub fn set_time(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(DrillError::NegativeTime(time));
        }
        log::trace!("set time {}", time);
        let resolved = self.resolve_all(|p| p.resolve_at(time))?;
        self.apply_all(resolved);
        self.time = time;
        Ok(())
    }

    /// Move every player forward by `delta` beats from the last query
    pub fn advance_time(&mut self, delta: f64) -> Result<()> {
        check_beats(delta)?;
        log::trace!("advance time by {}", delta);
        let resolved = self.resolve_all(|p| p.resolve_after(delta))?;
        self.apply_all(resolved);
        self.time += delta;
        Ok(())
    }

    /// Compact state of the whole band
    pub fn snapshot(&self) -> BandSnapshot {
        BandSnapshot {
            time: self.time,
            last_command_time: self.last_command_time,
            start_equal: self.start_equal,
            players: self.players.iter().map(PlayerSnapshot::from).collect(),
        }
    }
}

/// Compact band snapshot for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSnapshot {
    pub time: f64,
    pub last_command_time: f64,
    pub start_equal: bool,
    pub players: Vec<PlayerSnapshot>,
}
