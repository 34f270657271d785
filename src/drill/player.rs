//! Player - Path segments, speed commands and pose resolution
//!
//! A player's path is an append-only list of segments parameterized by
//! distance. Speed commands turn performance time into distance walked; the
//! distance then selects the segment and the offset inside it.

use serde::{Deserialize, Serialize};

use crate::drill::geometry::{PathShape, Pose};
use crate::error::{DrillError, Result};

/// Radius used for in-place pivots, where a true zero radius has no tangent
pub const PIVOT_RADIUS: f64 = 1e-6;

/// Relative slack when a query lands on the very end of a path
const END_OF_PATH_TOLERANCE: f64 = 1e-9;

pub(crate) fn check_beats(beats: f64) -> Result<()> {
    if !beats.is_finite() || beats < 0.0 {
        return Err(DrillError::InvalidDuration(beats));
    }
    Ok(())
}

pub(crate) fn check_angle(angle: f64) -> Result<()> {
    if !angle.is_finite() {
        return Err(DrillError::InvalidAngle(angle));
    }
    Ok(())
}

/// One continuous piece of a player's path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    shape: PathShape,
    length: f64,
    cumulative_start: f64,
    cumulative_end: f64,
}

impl Segment {
    /// Geometry of this piece (straight or arc)
    pub fn shape(&self) -> &PathShape {
        &self.shape
    }

    /// Walking distance covered by this segment alone
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Distance from the path origin to the start of this segment
    pub fn cumulative_start(&self) -> f64 {
        self.cumulative_start
    }

    /// Distance from the path origin to the end of this segment
    pub fn cumulative_end(&self) -> f64 {
        self.cumulative_end
    }

    /// Pose where this segment begins
    pub fn start_pose(&self) -> Pose {
        self.shape.start()
    }

    /// Pose where this segment ends
    pub fn end_pose(&self) -> Pose {
        self.shape.evaluate(self.length)
    }

    /// Pose `local_distance` into this segment
    pub fn pose_at(&self, local_distance: f64) -> Pose {
        self.shape.evaluate(local_distance)
    }
}

/// "From `time` onward, walk `stride` distance per beat"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedCommand {
    pub time: f64,
    pub stride: f64,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledCommand {
    /// Append order, used to roll back failed maneuvers
    seq: usize,
    command: SpeedCommand,
}

/// Piecewise-constant walking speed over time
#[derive(Debug, Clone)]
pub struct SpeedProfile {
    base_stride: f64,
    /// Sorted by time; equal times keep append order
    commands: Vec<ScheduledCommand>,
    appended: usize,
}

impl SpeedProfile {
    /// Profile walking `base_stride` until the first command
    pub fn new(base_stride: f64) -> Self {
        Self {
            base_stride,
            commands: Vec::new(),
            appended: 0,
        }
    }

    /// Stride before any command takes effect
    pub fn base_stride(&self) -> f64 {
        self.base_stride
    }

    /// Schedule a speed change.
    ///
    /// Commands may arrive out of time order; they are kept sorted so that the
    /// command in effect at `t` is always the last one with `time <= t`.
    pub fn push(&mut self, command: SpeedCommand) {
        let idx = self.commands.partition_point(|c| c.command.time <= command.time);
        self.commands.insert(
            idx,
            ScheduledCommand {
                seq: self.appended,
                command,
            },
        );
        self.appended += 1;
    }

    /// Commands in time order
    pub fn commands(&self) -> impl Iterator<Item = SpeedCommand> + '_ {
        self.commands.iter().map(|c| c.command)
    }

    /// Number of scheduled commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Stride in effect at `time`
    pub fn stride_at(&self, time: f64) -> f64 {
        match self.commands.partition_point(|c| c.command.time <= time) {
            0 => self.base_stride,
            idx => self.commands[idx - 1].command.stride,
        }
    }

    /// Distance walked between `from` and `to` (`from <= to`)
    pub fn distance_between(&self, from: f64, to: f64) -> f64 {
        let mut stride = self.stride_at(from);
        let mut cursor = from;
        let mut distance = 0.0;

        let first = self.commands.partition_point(|c| c.command.time <= from);
        for scheduled in &self.commands[first..] {
            let command = scheduled.command;
            if command.time > to {
                break;
            }
            distance += (command.time - cursor) * stride;
            stride = command.stride;
            cursor = command.time;
        }

        distance + (to - cursor) * stride
    }

    /// Distance walked from time 0 until `time`
    pub fn distance_at(&self, time: f64) -> f64 {
        if time >= 0.0 {
            self.distance_between(0.0, time)
        } else {
            -self.distance_between(time, 0.0)
        }
    }

    fn mark(&self) -> usize {
        self.appended
    }

    fn rollback(&mut self, mark: usize) {
        self.commands.retain(|c| c.seq < mark);
        self.appended = mark;
    }
}

/// Evaluated state of a player at a given time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub time: f64,
    pub distance: f64,
    pub pose: Pose,
}

/// Restore point for a player, see [`Player::rollback`]
#[derive(Debug, Clone, Copy)]
pub struct PlayerMark {
    segments: usize,
    commands: usize,
    column: usize,
}

/// A single band member
#[derive(Debug, Clone)]
pub struct Player {
    row: usize,
    /// Current file; only changes when files cross in a counter-march
    column: usize,
    home_column: usize,
    start: Pose,
    profile: SpeedProfile,
    segments: Vec<Segment>,
    /// Last evaluated state
    state: Resolved,
}

impl Player {
    /// Player at (`row`, `column`) standing at `start`, walking `stride` per beat
    pub fn new(row: usize, column: usize, start: Pose, stride: f64) -> Self {
        Self {
            row,
            column,
            home_column: column,
            start,
            profile: SpeedProfile::new(stride),
            segments: Vec::new(),
            state: Resolved {
                time: 0.0,
                distance: 0.0,
                pose: start,
            },
        }
    }

    /// Row in the formation, 0 at the front
    pub fn row(&self) -> usize {
        self.row
    }

    /// File the player currently marches in
    pub fn column(&self) -> usize {
        self.column
    }

    /// Column the player started in
    pub fn home_column(&self) -> usize {
        self.home_column
    }

    pub(crate) fn set_column(&mut self, column: usize) {
        self.column = column;
    }

    /// Nominal stride length
    pub fn stride(&self) -> f64 {
        self.profile.base_stride()
    }

    /// Pose before any path is walked
    pub fn start_pose(&self) -> Pose {
        self.start
    }

    /// Path segments in walking order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Speed commands of this player
    pub fn profile(&self) -> &SpeedProfile {
        &self.profile
    }

    /// Pose at the end of the defined path
    pub fn path_end(&self) -> Pose {
        self.segments.last().map_or(self.start, Segment::end_pose)
    }

    /// Total distance covered by the defined path
    pub fn path_length(&self) -> f64 {
        self.segments.last().map_or(0.0, Segment::cumulative_end)
    }

    fn push_segment(&mut self, shape: PathShape, length: f64) {
        let cumulative_start = self.path_length();
        self.segments.push(Segment {
            shape,
            length,
            cumulative_start,
            cumulative_end: cumulative_start + length,
        });
    }

    /// Walk straight on for `beats` at the nominal stride.
    ///
    /// Returns the time at which the walk ends.
    pub fn append_straight(&mut self, start_time: f64, beats: f64) -> Result<f64> {
        check_beats(beats)?;
        let length = beats * self.stride();
        self.push_segment(PathShape::straight(self.path_end()), length);
        Ok(start_time + beats)
    }

    /// Walk an arc of `angle` degrees (positive to the right) on `radius`,
    /// taking `beats` from `start_time`.
    ///
    /// The stride is adjusted so the arc takes exactly `beats`, then reset to
    /// the nominal stride. A zero-beat bend adds no speed commands.
    pub fn append_bend(&mut self, radius: f64, start_time: f64, angle: f64, beats: f64) -> Result<f64> {
        check_beats(beats)?;
        let shape = PathShape::arc(self.path_end(), radius, angle)?;
        let length = PathShape::arc_length(radius, angle);
        self.push_segment(shape, length);

        let end_time = start_time + beats;
        if beats > 0.0 {
            self.profile.push(SpeedCommand {
                time: start_time,
                stride: length / beats,
            });
            self.profile.push(SpeedCommand {
                time: end_time,
                stride: self.stride(),
            });
        }
        Ok(end_time)
    }

    /// Distance walked from time 0 until `time`
    pub fn distance_at_time(&self, time: f64) -> f64 {
        self.profile.distance_at(time)
    }

    fn unresolved(&self, distance: f64) -> DrillError {
        DrillError::UnresolvedDistance {
            row: self.row,
            column: self.column,
            distance,
            defined: self.path_length(),
        }
    }

    /// Pose after walking `distance` along the path
    pub fn pose_at_distance(&self, distance: f64) -> Result<Pose> {
        if distance.is_nan() || distance < 0.0 {
            return Err(self.unresolved(distance));
        }

        let idx = self.segments.partition_point(|s| s.cumulative_end <= distance);
        if let Some(segment) = self.segments.get(idx) {
            return Ok(segment.pose_at(distance - segment.cumulative_start));
        }

        // exactly at (or rounding past) the end of the path
        let total = self.path_length();
        if distance <= total + END_OF_PATH_TOLERANCE * total.max(1.0) {
            Ok(self.path_end())
        } else {
            Err(self.unresolved(distance))
        }
    }

    /// Evaluate the player at an absolute time without touching the cache
    pub fn resolve_at(&self, time: f64) -> Result<Resolved> {
        if !time.is_finite() || time < 0.0 {
            return Err(DrillError::NegativeTime(time));
        }
        let distance = self.distance_at_time(time);
        let pose = self.pose_at_distance(distance)?;
        Ok(Resolved {
            time,
            distance,
            pose,
        })
    }

    /// Evaluate the player `delta` beats after the cached state, integrating
    /// only the speed profile over that interval
    pub fn resolve_after(&self, delta: f64) -> Result<Resolved> {
        check_beats(delta)?;
        let time = self.state.time + delta;
        let distance = self.state.distance + self.profile.distance_between(self.state.time, time);
        let pose = self.pose_at_distance(distance)?;
        Ok(Resolved {
            time,
            distance,
            pose,
        })
    }

    pub(crate) fn apply(&mut self, resolved: Resolved) {
        self.state = resolved;
    }

    /// Recompute the cached pose from scratch at `time`
    pub fn set_time(&mut self, time: f64) -> Result<()> {
        let resolved = self.resolve_at(time)?;
        self.apply(resolved);
        Ok(())
    }

    /// Move the cached pose forward by `delta` beats
    pub fn advance_time(&mut self, delta: f64) -> Result<()> {
        let resolved = self.resolve_after(delta)?;
        self.apply(resolved);
        Ok(())
    }

    /// Cached pose from the last time query
    pub fn pose(&self) -> Pose {
        self.state.pose
    }

    /// Cached distance walked at the last time query
    pub fn distance(&self) -> f64 {
        self.state.distance
    }

    /// Time of the last query
    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub(crate) fn mark(&self) -> PlayerMark {
        PlayerMark {
            segments: self.segments.len(),
            commands: self.profile.mark(),
            column: self.column,
        }
    }

    /// Drop everything appended since `mark` was taken
    pub(crate) fn rollback(&mut self, mark: PlayerMark) {
        self.segments.truncate(mark.segments);
        self.profile.rollback(mark.commands);
        self.column = mark.column;
    }
}

/// Compact player state for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub row: usize,
    pub column: usize,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub distance: f64,
}

impl From<&Player> for PlayerSnapshot {
    fn from(player: &Player) -> Self {
        let pose = player.pose();
        Self {
            row: player.row,
            column: player.column,
            x: pose.position.x,
            y: pose.position.y,
            angle: pose.angle,
            distance: player.distance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::geometry::Vec2;
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn player() -> Player {
        Player::new(0, 0, Pose::default(), 1.0)
    }

    #[test]
    fn profile_defaults_to_base_stride() {
        let profile = SpeedProfile::new(0.8);
        assert_close(profile.distance_at(5.0), 4.0);
        assert_close(profile.stride_at(-1.0), 0.8);
    }

    #[test]
    fn profile_integrates_step_velocity() {
        let mut profile = SpeedProfile::new(1.0);
        profile.push(SpeedCommand { time: 2.0, stride: 0.5 });
        profile.push(SpeedCommand { time: 4.0, stride: 2.0 });

        assert_close(profile.distance_at(1.0), 1.0);
        assert_close(profile.distance_at(3.0), 2.5);
        assert_close(profile.distance_at(6.0), 7.0);
        assert_close(profile.distance_between(3.0, 6.0), 4.5);
    }

    #[test]
    fn out_of_order_commands_use_latest_time() {
        let mut profile = SpeedProfile::new(1.0);
        profile.push(SpeedCommand { time: 4.0, stride: 2.0 });
        profile.push(SpeedCommand { time: 2.0, stride: 0.5 });

        let times: Vec<f64> = profile.commands().map(|c| c.time).collect();
        assert_eq!(times, vec![2.0, 4.0]);
        assert_close(profile.stride_at(3.0), 0.5);
        assert_close(profile.distance_at(6.0), 7.0);
    }

    #[test]
    fn same_time_commands_keep_append_order() {
        let mut profile = SpeedProfile::new(1.0);
        profile.push(SpeedCommand { time: 2.0, stride: 1.0 });
        profile.push(SpeedCommand { time: 2.0, stride: 3.0 });
        assert_close(profile.stride_at(2.0), 3.0);
        assert_close(profile.distance_at(3.0), 5.0);
    }

    #[test]
    fn straight_segment_round_trip() {
        let mut p = Player::new(0, 0, Pose::new(Vec2::new(1.0, 1.0), 90.0), 0.5);
        let end = p.append_straight(0.0, 4.0).unwrap();
        assert_close(end, 4.0);

        let segment = p.segments()[0];
        assert_close(segment.length(), 2.0);
        assert_eq!(segment.start_pose(), p.start_pose());
        let end_pose = segment.end_pose();
        assert_close(end_pose.position.x, 1.0);
        assert_close(end_pose.position.y, 3.0);
        assert_close(end_pose.angle, 90.0);
    }

    #[test]
    fn bend_schedules_speed_change() {
        let mut p = player();
        let end = p.append_bend(1.0, 0.0, 90.0, 2.0).unwrap();
        assert_close(end, 2.0);

        let commands: Vec<SpeedCommand> = p.profile().commands().collect();
        assert_eq!(commands.len(), 2);
        assert_close(commands[0].time, 0.0);
        assert_close(commands[0].stride, PI / 4.0);
        assert_close(commands[1].time, 2.0);
        assert_close(commands[1].stride, 1.0);

        let distance = p.distance_at_time(1.0);
        assert_close(distance, PI / 4.0);
        let pose = p.pose_at_distance(distance).unwrap();
        let h = 0.5f64.sqrt();
        assert_close(pose.position.x, h);
        assert_close(pose.position.y, h - 1.0);
        assert_close(pose.angle, -45.0);
    }

    #[test]
    fn segments_record_their_shape() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        p.append_bend(1.5, 2.0, -60.0, 3.0).unwrap();

        assert!(matches!(p.segments()[0].shape(), PathShape::Straight { .. }));
        match *p.segments()[1].shape() {
            PathShape::Arc { start, radius, sweep } => {
                assert_eq!(start, p.segments()[0].end_pose());
                assert_close(radius, 1.5);
                assert_close(sweep, -60.0);
            }
            other => panic!("expected an arc, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_bend_angle_rejected() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        assert!(matches!(
            p.append_bend(1.0, 2.0, f64::NAN, 2.0),
            Err(DrillError::InvalidAngle(_))
        ));
        assert_eq!(p.segments().len(), 1);
        assert!(p.profile().is_empty());
        assert_close(p.path_length(), 2.0);
    }

    #[test]
    fn negative_time_rejected() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        assert!(matches!(p.set_time(-1.0), Err(DrillError::NegativeTime(_))));
        assert!(matches!(p.resolve_at(f64::NAN), Err(DrillError::NegativeTime(_))));
        assert_close(p.time(), 0.0);
    }

    #[test]
    fn repeated_queries_are_idempotent() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        p.append_bend(1.0, 2.0, 90.0, 2.0).unwrap();

        p.set_time(3.0).unwrap();
        let first = (p.time(), p.distance(), p.pose());
        p.set_time(3.0).unwrap();
        assert_eq!((p.time(), p.distance(), p.pose()), first);
        p.advance_time(0.0).unwrap();
        assert_eq!((p.time(), p.distance(), p.pose()), first);
    }

    #[test]
    fn instant_pivot_adds_no_commands() {
        let mut p = player();
        p.append_bend(PIVOT_RADIUS, 0.0, -90.0, 0.0).unwrap();
        assert!(p.profile().is_empty());
        assert_close(p.path_end().angle, 90.0);
    }

    #[test]
    fn cumulative_distances_chain() {
        let mut p = player();
        p.append_straight(0.0, 3.0).unwrap();
        p.append_bend(2.0, 3.0, 45.0, 4.0).unwrap();
        p.append_straight(7.0, 0.0).unwrap();
        p.append_straight(7.0, 1.5).unwrap();

        let mut previous = 0.0;
        for segment in p.segments() {
            assert!(segment.cumulative_end() >= previous);
            assert_close(segment.cumulative_end() - previous, segment.length());
            previous = segment.cumulative_end();
        }
    }

    #[test]
    fn end_of_path_resolves_to_end_pose() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        p.append_bend(PIVOT_RADIUS, 2.0, 90.0, 0.0).unwrap();

        let pose = p.pose_at_distance(p.path_length()).unwrap();
        assert!((pose.position.x - 2.0).abs() < 1e-5);
        assert_close(pose.angle, -90.0);

        // the pivot itself starts where the straight ends
        let before = p.pose_at_distance(2.0).unwrap();
        assert_close(before.angle, 0.0);
    }

    #[test]
    fn beyond_path_is_an_error() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        assert!(matches!(
            p.set_time(3.0),
            Err(DrillError::UnresolvedDistance { .. })
        ));
        // cache untouched
        assert_eq!(p.pose(), p.start_pose());
        assert_close(p.time(), 0.0);
    }

    #[test]
    fn empty_path_resolves_only_at_start() {
        let p = player();
        assert_eq!(p.pose_at_distance(0.0).unwrap(), p.start_pose());
        assert!(p.pose_at_distance(0.1).is_err());
    }

    #[test]
    fn negative_beats_rejected() {
        let mut p = player();
        assert!(matches!(
            p.append_straight(0.0, -1.0),
            Err(DrillError::InvalidDuration(_))
        ));
        assert!(p.append_bend(1.0, 0.0, 90.0, f64::INFINITY).is_err());
        assert!(p.segments().is_empty());
    }

    #[test]
    fn rollback_restores_path_and_commands() {
        let mut p = player();
        p.append_bend(1.0, 0.0, 90.0, 2.0).unwrap();
        let mark = p.mark();
        p.append_bend(1.0, 2.0, 90.0, 2.0).unwrap();
        p.set_column(3);
        p.rollback(mark);

        assert_eq!(p.segments().len(), 1);
        assert_eq!(p.profile().len(), 2);
        assert_eq!(p.column(), 0);
    }

    #[test]
    fn incremental_matches_absolute() {
        let mut p = player();
        p.append_straight(0.0, 2.0).unwrap();
        p.append_bend(1.5, 2.0, -120.0, 3.0).unwrap();
        p.append_straight(5.0, 4.0).unwrap();

        let mut incremental = p.clone();
        for _ in 0..18 {
            incremental.advance_time(0.5).unwrap();
        }
        p.set_time(9.0).unwrap();

        assert_close(incremental.distance(), p.distance());
        assert_close(incremental.pose().position.x, p.pose().position.x);
        assert_close(incremental.pose().position.y, p.pose().position.y);
        assert_close(incremental.pose().angle, p.pose().angle);
    }
}
