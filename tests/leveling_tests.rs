use chrono::{Duration, NaiveDate, NaiveDateTime};
use gantt_leveler::calendar::{Calendar, DaySchedule};
use gantt_leveler::leveling::{LevelingPlanner, LevelingTask, initial_offset, resolve_today};
use gantt_leveler::slots::{SlotError, Slots};
use gantt_leveler::task::{ConcurrencyStamp, TaskAttributes};
use gantt_leveler::{LevelingError, level_delays};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn task(row_id: i64, hours: i64) -> LevelingTask {
    LevelingTask::new(
        row_id,
        format!("T-{row_id}"),
        TaskAttributes::new(Duration::hours(hours)),
    )
}

#[test]
fn find_slot_prefers_lowest_index_on_ties() {
    let slots = Slots::new(3, Duration::hours(2));
    assert_eq!(slots.find_slot(), Ok(0));

    let mut slots = Slots::new(3, Duration::zero());
    slots.force_set(0, Duration::hours(5)).unwrap();
    assert_eq!(slots.find_slot(), Ok(1));
}

#[test]
fn read_and_add_returns_previous_load() {
    let mut slots = Slots::new(2, Duration::zero());
    let placed: Vec<_> = [8, 4, 4]
        .into_iter()
        .map(|h| slots.read_and_add(Duration::hours(h)).unwrap())
        .collect();

    assert_eq!(
        placed,
        vec![
            (Duration::zero(), 0),
            (Duration::zero(), 1),
            (Duration::hours(4), 1),
        ]
    );
    assert_eq!(slots.loads(), &[Duration::hours(8), Duration::hours(8)]);
}

#[test]
fn two_tracks_take_three_four_hour_tasks() {
    let mut slots = Slots::new(2, Duration::zero());
    let delays: Vec<_> = (0..3)
        .map(|_| slots.read_and_add(Duration::hours(4)).unwrap().0)
        .collect();
    assert_eq!(
        delays,
        vec![Duration::zero(), Duration::zero(), Duration::hours(4)]
    );
    assert_eq!(slots.loads(), &[Duration::hours(8), Duration::hours(4)]);
}

#[test]
fn read_and_add_reports_overflow_without_changing_the_load() {
    let near_max = Duration::milliseconds(i64::MAX / 2 + 1);
    let mut slots = Slots::new(1, Duration::zero());
    slots.read_and_add(near_max).unwrap();
    assert_eq!(
        slots.read_and_add(near_max),
        Err(SlotError::Overflow { index: 0 })
    );
    assert_eq!(slots.load(0), Some(near_max));
}

#[test]
fn empty_slots_fail_every_lookup() {
    let mut slots = Slots::new(0, Duration::zero());
    assert!(slots.is_empty());
    assert_eq!(slots.find_slot(), Err(SlotError::NoSlots));
    assert_eq!(
        slots.read_and_add(Duration::hours(1)),
        Err(SlotError::NoSlots)
    );
}

#[test]
fn force_set_replaces_load_and_checks_bounds() {
    let mut slots = Slots::new(2, Duration::hours(3));
    slots.force_set(1, Duration::hours(1)).unwrap();
    assert_eq!(slots.load(1), Some(Duration::hours(1)));
    assert_eq!(slots.find_slot(), Ok(1));
    assert_eq!(
        slots.force_set(2, Duration::zero()),
        Err(SlotError::OutOfRange { index: 2, len: 2 })
    );
}

#[test]
fn future_project_starts_from_zero() {
    let cal = Calendar::business_week(1, "Office");
    assert_eq!(initial_offset(&cal, 20240115, 20240108), Duration::zero());
    assert_eq!(initial_offset(&cal, 20240108, 20240108), Duration::zero());
}

#[test]
fn running_project_starts_from_elapsed_working_time() {
    let cal = Calendar::business_week(1, "Office")
        .with_custom_day(20240103, DaySchedule::non_working());
    assert_eq!(initial_offset(&cal, 20240101, 20240108), Duration::hours(32));
}

#[test]
fn explicit_today_override_wins() {
    assert_eq!(resolve_today(Some(20240108)), 20240108);
    // Non-positive overrides fall back to the clock, which is never that old.
    assert!(resolve_today(Some(0)) > 20240108);
    assert!(resolve_today(None) > 20240108);
}

#[test]
fn two_tracks_level_three_tasks() {
    let cal = Calendar::business_week(1, "Office");
    let tasks = [task(1, 8), task(2, 8), task(3, 16)];

    let results = level_delays(&cal, 20240108, Some(20240101), 2, &tasks).unwrap();
    let delays: Vec<_> = results.iter().map(|r| r.delay).collect();
    assert_eq!(
        delays,
        vec![Duration::zero(), Duration::zero(), Duration::hours(8)]
    );
    assert!(results.iter().all(|r| !r.pinned));
    assert_eq!(results[2].issue_key, "T-3");
}

#[test]
fn single_track_serializes_tasks() {
    let cal = Calendar::business_week(1, "Office");
    let tasks = [task(1, 4), task(2, 6), task(3, 2)];

    let results = level_delays(&cal, 20240108, Some(20240101), 1, &tasks).unwrap();
    let delays: Vec<_> = results.iter().map(|r| r.delay).collect();
    assert_eq!(
        delays,
        vec![Duration::zero(), Duration::hours(4), Duration::hours(10)]
    );
}

#[test]
fn single_track_end_to_end() {
    let cal = Calendar::business_week(1, "Office");
    let results = level_delays(&cal, 20240108, Some(20240101), 1, &[task(1, 16), task(2, 8)]).unwrap();
    let delays: Vec<_> = results.iter().map(|r| r.delay).collect();
    assert_eq!(delays, vec![Duration::zero(), Duration::hours(16)]);
}

#[test]
fn huge_durations_fail_instead_of_overflowing() {
    let cal = Calendar::business_week(1, "Office");
    let huge = |row_id| {
        LevelingTask::new(
            row_id,
            format!("T-{row_id}"),
            TaskAttributes::new(Duration::milliseconds(i64::MAX / 2 + 1)),
        )
    };
    assert_eq!(
        level_delays(&cal, 20240108, Some(20240101), 1, &[huge(1), huge(2), huge(3)]).unwrap_err(),
        LevelingError::Slots(SlotError::Overflow { index: 0 })
    );

    let mut planner = LevelingPlanner::new(&cal, 20240101, 20240101, 1).unwrap();
    let pinned = TaskAttributes::new(Duration::milliseconds(i64::MAX)).pinned_at(at(2024, 1, 3, 9));
    assert_eq!(planner.pinned_end_offset(&pinned), None);
    assert_eq!(
        planner.place(&pinned).unwrap_err(),
        LevelingError::Slots(SlotError::Overflow { index: 0 })
    );
}

#[test]
fn running_project_delays_include_elapsed_time() {
    let cal = Calendar::business_week(1, "Office");
    // Project started Monday 2024-01-01, leveled on Wednesday 2024-01-03.
    let results = level_delays(&cal, 20240101, Some(20240103), 2, &[task(1, 8), task(2, 8)]).unwrap();
    assert_eq!(results[0].delay, Duration::hours(16));
    assert_eq!(results[1].delay, Duration::hours(16));
}

#[test]
fn pinned_task_gets_zero_delay_and_reserves_a_track() {
    let cal = Calendar::business_week(1, "Office");
    let mut planner = LevelingPlanner::new(&cal, 20240101, 20240101, 2).unwrap();

    // Pinned to Wednesday: two working days after the start, plus its own 8h.
    let pinned = TaskAttributes::new(Duration::hours(8)).pinned_at(at(2024, 1, 3, 9));
    let placement = planner.place(&pinned).unwrap();
    assert!(placement.pinned);
    assert_eq!(placement.delay, Duration::zero());
    assert_eq!(placement.slot, 0);
    assert_eq!(placement.slot_load, Duration::hours(24));

    let free = planner.place(&TaskAttributes::new(Duration::hours(4))).unwrap();
    assert_eq!((free.delay, free.slot), (Duration::zero(), 1));
    let free = planner.place(&TaskAttributes::new(Duration::hours(4))).unwrap();
    assert_eq!((free.delay, free.slot), (Duration::hours(4), 1));
    assert_eq!(
        planner.slots().loads(),
        &[Duration::hours(24), Duration::hours(8)]
    );
}

#[test]
fn pinned_task_overwrites_a_busier_cursor() {
    let cal = Calendar::business_week(1, "Office");
    let mut planner = LevelingPlanner::new(&cal, 20240101, 20240101, 1).unwrap();
    planner.place(&TaskAttributes::new(Duration::hours(40))).unwrap();

    let mut pinned = TaskAttributes::new(Duration::hours(2));
    pinned.manual_finish = Some(at(2024, 1, 1, 11));
    pinned.start = Some(at(2024, 1, 1, 9));
    let placement = planner.place(&pinned).unwrap();
    assert_eq!(placement.slot_load, Duration::hours(2));

    let next = planner.place(&TaskAttributes::new(Duration::hours(1))).unwrap();
    assert_eq!(next.delay, Duration::hours(2));
}

#[test]
fn pinned_task_without_start_counts_from_project_start() {
    let cal = Calendar::business_week(1, "Office");
    let planner = LevelingPlanner::new(&cal, 20240101, 20240101, 1).unwrap();
    let mut attributes = TaskAttributes::new(Duration::hours(6));
    attributes.manual_start = Some(at(2024, 1, 10, 9));
    assert_eq!(planner.pinned_end_offset(&attributes), Some(Duration::hours(6)));
}

#[test]
fn results_carry_the_stamp_that_was_read() {
    let cal = Calendar::business_week(1, "Office");
    let stamp = ConcurrencyStamp::new(77, 3);
    let mut planner = LevelingPlanner::new(&cal, 20240101, 20240101, 1).unwrap();
    let result = planner
        .level(&LevelingTask::new(
            9,
            "OPS-9",
            TaskAttributes::new(Duration::hours(1)).with_stamp(stamp),
        ))
        .unwrap();
    assert_eq!(result.stamp, stamp);
    assert_eq!(result.row_id, 9);
}

#[test]
fn zero_tracks_cannot_level() {
    let cal = Calendar::business_week(1, "Office");
    assert_eq!(
        LevelingPlanner::new(&cal, 20240101, 20240101, 0).unwrap_err(),
        LevelingError::Slots(SlotError::NoSlots)
    );
    assert!(level_delays(&cal, 20240101, Some(20240101), 0, &[task(1, 1)]).is_err());
}

#[test]
fn empty_task_list_levels_to_nothing() {
    let cal = Calendar::business_week(1, "Office");
    assert!(
        level_delays(&cal, 20240101, Some(20240101), 3, &[])
            .unwrap()
            .is_empty()
    );
}
