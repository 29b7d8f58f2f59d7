use grid_2048::engine::{self as GameEngine, Direction, Grid, GridError};
use grid_2048::session::Session;
use grid_2048::trace::{self, Recorder};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;

#[test]
fn first_move_merges_and_spawns() {
    let start = Grid::try_from(vec![
        vec![2, 2, 0, 0],
        vec![0, 0, 0, 0],
        vec![0, 0, 0, 0],
        vec![0, 0, 0, 0],
    ])
    .unwrap();
    let mut rng = StdRng::seed_from_u64(2048);
    let r = GameEngine::apply_move(start, Direction::Left, &mut rng);
    assert!(r.moved);
    assert_eq!(r.score_gained, 4);
    assert_eq!(r.grid.rows()[0][0], 4);

    let spawned: Vec<u32> = r
        .grid
        .rows()
        .iter()
        .flatten()
        .copied()
        .filter(|&v| v != 0)
        .collect();
    assert_eq!(spawned.len(), 2);
    assert!(spawned.contains(&4));
    assert!(spawned.iter().all(|&v| v == 2 || v == 4));
}

#[test]
fn malformed_input_is_rejected() {
    assert_eq!(Grid::try_from(vec![vec![0; 4]; 5]).unwrap_err(), GridError::RowCount(5));
    assert!(matches!(
        Grid::try_from(vec![vec![0; 4], vec![0; 4], vec![0, 0, 5, 0], vec![0; 4]]),
        Err(GridError::InvalidTile { row: 2, col: 2, value: 5 })
    ));
}

#[test]
fn seeded_games_are_reproducible() {
    let play = |seed: u64| {
        let mut moves = StdRng::seed_from_u64(1);
        let mut game = Session::new(StdRng::seed_from_u64(seed));
        for _ in 0..200 {
            game.play(Direction::ALL[moves.gen_range(0..4)]);
        }
        (game.grid(), game.score())
    };
    assert_eq!(play(17), play(17));
}

#[test]
fn recorded_session_replays_cleanly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.g2run");

    let mut moves = StdRng::seed_from_u64(3);
    let mut game = Session::new(StdRng::seed_from_u64(33));
    let mut rec = Recorder::new(game.grid(), Some(33));
    while !game.is_over() {
        let d = Direction::ALL[moves.gen_range(0..4)];
        let out = game.play(d);
        if out.moved {
            rec.record(d, out.score_gained, game.grid());
        }
    }
    let run = rec.finish(None);
    assert_eq!(run.meta.final_score, game.score());
    assert!(run.states.last().unwrap().is_terminal());

    trace::write_run_to_path(&path, &run).unwrap();
    let back = trace::parse_run_file(&path).unwrap();
    assert_eq!(back.meta.seed, Some(33));
    assert_eq!(back.meta.label, None);
    assert_eq!(back.verify().unwrap(), game.score());
}
