use rand::Rng;

use super::grid::{is_tile_value, Direction, Grid, Line, MoveResult, Score, SIZE};

/// Empty grid seeded with two random tiles.
pub fn new_game<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    Grid::EMPTY.with_random_tile(rng).with_random_tile(rng)
}

/// Slide/merge tiles in the given direction. No randomness.
pub fn slide(grid: Grid, direction: Direction) -> MoveResult {
    debug_assert!(grid.0.iter().flatten().all(|&v| is_tile_value(v)), "malformed grid {grid:?}");
    let (result, score_gained) = match direction {
        Direction::Left => shift_rows(grid, false),
        Direction::Right => shift_rows(grid, true),
        Direction::Up => {
            let (g, s) = shift_rows(grid.transpose(), false);
            (g.transpose(), s)
        }
        Direction::Down => {
            let (g, s) = shift_rows(grid.transpose(), true);
            (g.transpose(), s)
        }
    };
    MoveResult { grid: result, score_gained, moved: result != grid }
}

/// Slide, then insert one random tile if the slide changed the grid.
///
/// An unchanged slide returns the input grid with zero score.
pub fn apply_move<R: Rng + ?Sized>(grid: Grid, direction: Direction, rng: &mut R) -> MoveResult {
    let slid = slide(grid, direction);
    if slid.moved {
        MoveResult { grid: slid.grid.with_random_tile(rng), ..slid }
    } else {
        slid
    }
}

/// Perform a move using the thread-local RNG.
pub fn make_move(grid: Grid, direction: Direction) -> MoveResult {
    let mut rng = rand::thread_rng();
    apply_move(grid, direction, &mut rng)
}

/// Insert a random 2 (90%) or 4 (10%) tile into a uniformly chosen empty cell.
pub fn with_random_tile<R: Rng + ?Sized>(grid: Grid, rng: &mut R) -> Grid {
    let empty = grid.empty_cells();
    if empty.is_empty() {
        return grid;
    }
    let (r, c) = empty[rng.gen_range(0..empty.len())];
    let mut cells = grid.0;
    cells[r][c] = generate_random_tile(rng);
    Grid(cells)
}

/// Insert a random tile using the thread-local RNG.
pub fn insert_random_tile(grid: Grid) -> Grid {
    grid.with_random_tile_thread()
}

/// True iff the grid has no empty cell and no horizontally or vertically
/// adjacent equal pair.
///
/// Agrees with `!has_legal_move` on every grid holding at least one tile:
/// a gap next to a tile always lets some slide move it. The all-empty grid
/// is the one exception (not terminal, yet nothing slides).
pub fn is_terminal(grid: Grid) -> bool {
    let g = &grid.0;
    for r in 0..SIZE {
        for c in 0..SIZE {
            if g[r][c] == 0 {
                return false;
            }
            if c < SIZE - 1 && g[r][c] == g[r][c + 1] {
                return false;
            }
            if r < SIZE - 1 && g[r][c] == g[r + 1][c] {
                return false;
            }
        }
    }
    true
}

/// True if sliding in some direction changes the grid.
pub fn has_legal_move(grid: Grid) -> bool {
    Direction::ALL.iter().any(|&d| slide(grid, d).moved)
}

/// Merge a single line toward index 0.
///
/// Non-zero tiles are compacted, each adjacent equal pair merges once
/// (a freshly merged tile does not merge again this pass), and the result
/// is zero-padded. Returns the new line and the score gained.
///
/// A pair whose sum does not fit in `u32` stays unmerged. Grids built
/// through the validating constructors never get near that.
///
/// ```
/// use grid_2048::engine::merge_line;
/// assert_eq!(merge_line([2, 2, 2, 2]), ([4, 4, 0, 0], 8));
/// assert_eq!(merge_line([2, 0, 2, 4]), ([4, 4, 0, 0], 4));
/// ```
pub fn merge_line(line: Line) -> (Line, Score) {
    let mut tiles: Vec<u32> = line.iter().copied().filter(|&v| v != 0).collect();
    let mut score: Score = 0;
    let mut i = 0;
    while i + 1 < tiles.len() {
        match tiles[i].checked_mul(2) {
            Some(merged) if tiles[i] == tiles[i + 1] => {
                tiles[i] = merged;
                score += merged as Score;
                tiles[i + 1] = 0;
                i += 2;
            }
            _ => i += 1,
        }
    }
    let mut out = [0; SIZE];
    for (slot, v) in out.iter_mut().zip(tiles.into_iter().filter(|&v| v != 0)) {
        *slot = v;
    }
    (out, score)
}

fn shift_rows(grid: Grid, reversed: bool) -> (Grid, Score) {
    let mut cells = grid.0;
    let mut score = 0;
    for line in cells.iter_mut() {
        if reversed {
            line.reverse();
        }
        let (merged, gained) = merge_line(*line);
        *line = merged;
        if reversed {
            line.reverse();
        }
        score += gained;
    }
    (Grid(cells), score)
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    if rng.gen_range(0..10) < 9 { 2 } else { 4 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn grid(rows: [[u32; 4]; 4]) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    #[test]
    fn it_merge_line() {
        assert_eq!(merge_line([0, 0, 0, 0]), ([0, 0, 0, 0], 0));
        assert_eq!(merge_line([2, 2, 2, 2]), ([4, 4, 0, 0], 8));
        assert_eq!(merge_line([0, 0, 2, 2]), ([4, 0, 0, 0], 4));
        assert_eq!(merge_line([2, 0, 2, 4]), ([4, 4, 0, 0], 4));
        assert_eq!(merge_line([2, 4, 8, 16]), ([2, 4, 8, 16], 0));
        assert_eq!(merge_line([4, 4, 8, 0]), ([8, 8, 0, 0], 8));
        assert_eq!(merge_line([2, 2, 4, 4]), ([4, 8, 0, 0], 12));
        assert_eq!(merge_line([8, 0, 0, 8]), ([16, 0, 0, 0], 16));
        assert_eq!(merge_line([2, 2, 2, 0]), ([4, 2, 0, 0], 4));
    }

    #[test]
    fn merge_line_never_overflows() {
        let top = 1u32 << 31;
        assert_eq!(merge_line([top, top, 0, 0]), ([top, top, 0, 0], 0));
        assert_eq!(merge_line([0, top, 0, top]), ([top, top, 0, 0], 0));
        assert_eq!(merge_line([1 << 30, 1 << 30, 2, 2]), ([top, 4, 0, 0], (1 << 31) + 4));

        let g = Grid([[top, top, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let r = slide(g, Direction::Left);
        assert!(!r.moved);
        assert_eq!(r.score_gained, 0);
        assert!(r.grid.0.iter().flatten().all(|&v| is_tile_value(v)));
    }

    #[test]
    fn test_slide_left_right() {
        let g = grid([[2, 4, 8, 16], [2, 8, 8, 4], [4, 0, 0, 4], [2, 0, 0, 4]]);
        let left = slide(g, Direction::Left);
        assert_eq!(left.grid.0, [[2, 4, 8, 16], [2, 16, 4, 0], [8, 0, 0, 0], [2, 4, 0, 0]]);
        assert_eq!(left.score_gained, 24);
        assert!(left.moved);

        let right = slide(g, Direction::Right);
        assert_eq!(right.grid.0, [[2, 4, 8, 16], [0, 2, 16, 4], [0, 0, 0, 8], [0, 0, 2, 4]]);
        assert_eq!(right.score_gained, 24);
    }

    #[test]
    fn test_slide_up_down() {
        let g = grid([[2, 2, 4, 2], [4, 8, 0, 0], [8, 8, 0, 0], [16, 4, 4, 4]]);
        let up = slide(g, Direction::Up);
        assert_eq!(up.grid.0, [[2, 2, 8, 2], [4, 16, 0, 4], [8, 4, 0, 0], [16, 0, 0, 0]]);
        assert_eq!(up.score_gained, 24);

        let down = slide(g, Direction::Down);
        assert_eq!(down.grid.0, [[2, 0, 0, 0], [4, 2, 0, 0], [8, 16, 0, 2], [16, 4, 8, 4]]);
        assert_eq!(down.score_gained, 24);
    }

    #[test]
    fn slide_without_change_reports_not_moved() {
        let g = grid([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]);
        let r = slide(g, Direction::Left);
        assert!(!r.moved);
        assert_eq!(r.grid, g);
        assert_eq!(r.score_gained, 0);
        assert!(slide(g, Direction::Down).moved);
    }

    #[test]
    fn compaction_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let mut g = new_game(&mut rng);
            for _ in 0..10 {
                g = g.with_random_tile(&mut rng);
            }
            for d in Direction::ALL {
                let once = slide(g, d);
                let twice = slide(once.grid, d);
                // only a merge can move tiles on an already-compacted grid
                assert_eq!(twice.moved, twice.score_gained > 0, "{g:?} {d}");
                if once.score_gained == 0 {
                    assert!(!twice.moved, "{g:?} {d}");
                }
            }
        }
    }

    #[test]
    fn merged_tiles_can_merge_on_the_next_slide() {
        let g = grid([[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]);
        let once = slide(g, Direction::Left);
        assert_eq!(once.grid.0[0], [4, 4, 0, 0]);
        let twice = slide(once.grid, Direction::Left);
        assert_eq!(twice.grid.0[0], [8, 0, 0, 0]);
        assert_eq!(twice.score_gained, 8);
    }

    #[test]
    fn right_mirrors_left() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let mut g = Grid::EMPTY;
            for _ in 0..rng.gen_range(1..16) {
                g = g.with_random_tile(&mut rng);
            }
            let right = slide(g, Direction::Right);
            let mirrored = slide(g.reverse_rows(), Direction::Left);
            assert_eq!(right.grid, mirrored.grid.reverse_rows());
            assert_eq!(right.score_gained, mirrored.score_gained);

            let down = slide(g, Direction::Down);
            let via_up = slide(g.transpose().reverse_rows().transpose(), Direction::Up);
            assert_eq!(down.grid, via_up.grid.transpose().reverse_rows().transpose());
        }
    }

    #[test]
    fn it_insert_random_tile() {
        let mut game = Grid::EMPTY;
        for _ in 0..16 {
            game = insert_random_tile(game);
        }
        assert_eq!(game.count_empty(), 0);
        assert!(game.0.iter().flatten().all(|&v| v == 2 || v == 4));
        // full grid stays untouched
        assert_eq!(insert_random_tile(game), game);
    }

    #[test]
    fn random_tile_fills_last_gap() {
        let mut rng = StdRng::seed_from_u64(3);
        let g = grid([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 0, 4], [4, 2, 4, 2]]);
        for _ in 0..50 {
            let filled = with_random_tile(g, &mut rng);
            assert_eq!(filled.count_empty(), 0);
            assert!(matches!(filled.tile(2, 2), 2 | 4));
        }
    }

    #[test]
    fn random_tile_value_distribution() {
        let mut rng = StdRng::seed_from_u64(2024);
        let fours = (0..10_000)
            .filter(|_| with_random_tile(Grid::EMPTY, &mut rng).highest_tile() == 4)
            .count();
        assert!((800..1200).contains(&fours), "fours = {fours}");
    }

    #[test]
    fn apply_move_inserts_only_when_moved() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = grid([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let r = apply_move(g, Direction::Left, &mut rng);
        assert!(r.moved);
        assert_eq!(r.score_gained, 4);
        assert_eq!(r.grid.tile(0, 0), 4);
        assert_eq!(r.grid.count_empty(), 14);
        let slid = slide(g, Direction::Left).grid;
        let mut spawned = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                if r.grid.tile(row, col) != slid.tile(row, col) {
                    spawned.push((row, col));
                }
            }
        }
        assert_eq!(spawned.len(), 1);
        let (nr, nc) = spawned[0];
        assert_eq!(slid.tile(nr, nc), 0);
        assert!(matches!(r.grid.tile(nr, nc), 2 | 4));

        let stuck = grid([[4, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let r = apply_move(stuck, Direction::Left, &mut rng);
        assert!(!r.moved);
        assert_eq!(r.grid, stuck);
    }

    #[test]
    fn test_is_terminal() {
        let full = grid([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(is_terminal(full));
        assert!(!has_legal_move(full));

        let one_gap = grid([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 0, 4], [4, 2, 4, 2]]);
        assert!(!is_terminal(one_gap));

        let horizontal_pair = grid([[2, 2, 8, 16], [4, 8, 16, 32], [8, 16, 32, 64], [16, 32, 64, 128]]);
        assert!(!is_terminal(horizontal_pair));
        let vertical_pair = grid([[2, 4, 8, 16], [2, 8, 16, 32], [8, 16, 32, 64], [16, 32, 64, 128]]);
        assert!(!is_terminal(vertical_pair));
        assert!(has_legal_move(vertical_pair));
    }

    #[test]
    fn terminal_matches_no_legal_move_on_non_empty_grids() {
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..2_000 {
            let mut g = Grid::EMPTY.with_random_tile(&mut rng);
            for _ in 0..rng.gen_range(0..40) {
                let d = Direction::ALL[rng.gen_range(0..4)];
                g = apply_move(g, d, &mut rng).grid.with_random_tile(&mut rng);
            }
            assert_eq!(is_terminal(g), !has_legal_move(g), "{g:?}");
        }
        // The empty grid is the lone disagreement.
        assert!(!is_terminal(Grid::EMPTY));
        assert!(!has_legal_move(Grid::EMPTY));
    }

    #[test]
    fn new_game_has_two_tiles() {
        let mut rng = StdRng::seed_from_u64(9);
        let g = new_game(&mut rng);
        assert_eq!(g.count_empty(), 14);
        assert!(g.0.iter().flatten().all(|&v| matches!(v, 0 | 2 | 4)));
    }
}
