use cover_2048::engine::{
    apply_move, collapse_line, has_any_legal_move, has_reached_target, initialize, random_empty_cell,
    spawn_random_tile, Direction, Grid, Position, Tile,
};
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

fn grid(rows: &[&[Tile]]) -> Grid {
    Grid::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

fn tile() -> impl Strategy<Value = Tile> {
    prop_oneof![
        3 => Just(0u32),
        4 => (1u32..12).prop_map(|e| 1u32 << e),
    ]
}

fn any_grid() -> impl Strategy<Value = Grid> {
    (2usize..7).prop_flat_map(|n| {
        prop::collection::vec(tile(), n * n).prop_map(move |cells| Grid::from_cells(n, cells).unwrap())
    })
}

fn direction() -> impl Strategy<Value = Direction> {
    prop::sample::select(Direction::ALL.to_vec())
}

fn all_tiles_valid(g: &Grid) -> bool {
    g.cells().iter().all(|&v| v == 0 || (v >= 2 && v.is_power_of_two()))
}

proptest! {
    #[test]
    fn moves_keep_power_of_two_tiles(g in any_grid(), dir in direction(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let out = apply_move(&g, dir);
        prop_assert!(all_tiles_valid(&out.grid));
        let spawned = spawn_random_tile(&out.grid, &mut rng);
        prop_assert!(all_tiles_valid(&spawned));
    }

    #[test]
    fn moves_never_add_tiles(g in any_grid(), dir in direction()) {
        let out = apply_move(&g, dir);
        prop_assert!(out.grid.tile_count() <= g.tile_count());
        prop_assert_eq!(out.grid.sum(), g.sum());
    }

    #[test]
    fn repeated_direction_is_stable_once_unmoved(g in any_grid(), dir in direction()) {
        let first = apply_move(&g, dir);
        let second = apply_move(&first.grid, dir);
        if !second.moved {
            prop_assert_eq!(&second.grid, &first.grid);
            prop_assert_eq!(second.score_delta, 0);
        }
    }

    #[test]
    fn collapse_conserves_line_sum(line in prop::collection::vec(tile(), 0..9)) {
        let before: u64 = line.iter().map(|&v| v as u64).sum();
        let c = collapse_line(&line);
        let after: u64 = c.line.iter().map(|&v| v as u64).sum();
        prop_assert_eq!(c.line.len(), line.len());
        prop_assert_eq!(before, after);
        // Zeros only trail.
        let first_zero = c.line.iter().position(|&v| v == 0).unwrap_or(c.line.len());
        prop_assert!(c.line[first_zero..].iter().all(|&v| v == 0));
    }

    #[test]
    fn unmoved_means_identical(g in any_grid(), dir in direction()) {
        let out = apply_move(&g, dir);
        prop_assert_eq!(out.moved, out.grid != g);
        if !out.moved {
            prop_assert_eq!(out.score_delta, 0);
        }
    }

    #[test]
    fn legal_move_check_matches_trying_every_direction(g in any_grid()) {
        prop_assume!(g.tile_count() > 0);
        let any_moves = Direction::ALL.iter().any(|&d| apply_move(&g, d).moved);
        prop_assert_eq!(has_any_legal_move(&g), any_moves);
    }
}

#[test]
fn up_and_down_follow_row_order() {
    let g = grid(&[&[0, 0, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 0], &[2, 0, 0, 2]]);
    let up = apply_move(&g, Direction::Up);
    assert!(up.moved);
    assert_eq!(up.score_delta, 0);
    assert_eq!(up.grid, grid(&[&[2, 0, 0, 2], &[0, 0, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 0]]));

    let down = apply_move(&g, Direction::Down);
    assert!(!down.moved);
    assert_eq!(down.grid, g);
}

#[test]
fn every_direction_reaches_its_edge() {
    let g = grid(&[&[0, 0, 0], &[0, 8, 0], &[0, 0, 0]]);
    let at = |dir, pos| apply_move(&g, dir).grid.get(pos);
    assert_eq!(at(Direction::Up, Position::new(0, 1)), Some(8));
    assert_eq!(at(Direction::Down, Position::new(2, 1)), Some(8));
    assert_eq!(at(Direction::Left, Position::new(1, 0)), Some(8));
    assert_eq!(at(Direction::Right, Position::new(1, 2)), Some(8));
}

#[test]
fn triple_merges_from_the_leading_edge() {
    let g = grid(&[&[2, 2, 2, 0], &[0, 0, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 0]]);
    let left = apply_move(&g, Direction::Left);
    assert_eq!(left.grid.rows()[0], vec![4, 2, 0, 0]);
    assert_eq!(left.score_delta, 4);

    let right = apply_move(&g, Direction::Right);
    assert_eq!(right.grid.rows()[0], vec![0, 0, 2, 4]);

    let col = grid(&[&[2, 0], &[2, 0]]);
    assert_eq!(apply_move(&col, Direction::Down).grid, grid(&[&[0, 0], &[4, 0]]));
}

#[test]
fn spawn_values_are_ninety_ten() {
    let g = grid(&[&[2, 4, 8, 16], &[32, 64, 128, 256], &[2, 4, 8, 16], &[32, 64, 128, 0]]);
    let mut rng = StdRng::seed_from_u64(2048);
    let trials = 10_000;
    let mut twos = 0;
    for _ in 0..trials {
        let s = spawn_random_tile(&g, &mut rng);
        match s.get(Position::new(3, 3)) {
            Some(2) => twos += 1,
            Some(4) => {}
            other => panic!("unexpected spawn {:?}", other),
        }
    }
    let ratio = twos as f64 / trials as f64;
    assert!((0.87..=0.93).contains(&ratio), "ratio of twos = {}", ratio);
}

#[test]
fn empty_cell_choice_is_uniform() {
    let g = grid(&[&[0, 2, 0], &[2, 2, 2], &[0, 2, 0]]);
    let corners = [Position::new(0, 0), Position::new(0, 2), Position::new(2, 0), Position::new(2, 2)];
    let mut counts = [0usize; 4];
    let mut rng = StdRng::seed_from_u64(11);
    let trials = 40_000;
    for _ in 0..trials {
        let pos = random_empty_cell(&g, &mut rng).unwrap();
        let idx = corners.iter().position(|&c| c == pos).expect("picked a non-empty cell");
        counts[idx] += 1;
    }
    for c in counts {
        // Expected 10_000 each; allow ~6 standard deviations.
        assert!((9_480..=10_520).contains(&c), "counts = {:?}", counts);
    }
}

#[test]
fn packed_grid_without_pairs_is_terminal() {
    let g = grid(&[&[2, 4, 8, 16], &[32, 64, 128, 256], &[2, 4, 8, 16], &[32, 64, 128, 256]]);
    assert!(!has_any_legal_move(&g));
    for dir in Direction::ALL {
        assert!(!apply_move(&g, dir).moved);
    }
    let opened = grid(&[&[2, 4, 8, 16], &[32, 64, 128, 256], &[2, 4, 0, 16], &[32, 64, 128, 256]]);
    assert!(has_any_legal_move(&opened));
}

#[test]
fn target_detection_uses_threshold() {
    let g = grid(&[&[2, 4], &[2048, 0]]);
    assert!(has_reached_target(&g, 2048));
    assert!(!has_reached_target(&g, 4096));
    assert!(!has_reached_target(&Grid::empty(4), 2));
}

#[test]
fn initialize_places_two_small_tiles() {
    for seed in 0..500u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let g = initialize(4, &mut rng);
        assert_eq!(g.size(), 4);
        assert_eq!(g.tile_count(), 2);
        assert_eq!(g.count_empty(), 14);
        assert!(g.cells().iter().all(|&v| v == 0 || v == 2 || v == 4));
    }
}

#[test]
fn empty_grid_has_requested_size() {
    let g = Grid::empty(5);
    assert_eq!(g.size(), 5);
    assert_eq!(g.cells().len(), 25);
    assert!(g.cells().iter().all(|&v| v == 0));
}
