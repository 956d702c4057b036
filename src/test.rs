#[cfg(test)]
pub mod test {
    use anyhow::Result;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::board::{Board, BoardError, Cell, Player};
    use crate::config::{ConfigError, Difficulty, EngineConfig};
    use crate::dispatch::{select_best, BranchResult};
    use crate::engine::{get_move, DecisionKind, Engine};
    use crate::evaluation::{evaluate, score_bound, EvalWeights};
    use crate::lookup_table::{move_quality, BlendWeights, LookupTable, MAX_QUALITY};
    use crate::outcome::{check_win, is_terminal, winner, winning_columns, WINDOWS};
    use crate::search::{minimax, Overlay, Search, SearchError, INFINITY, WIN_SENTINEL};

    // a full board with no four in a row, row 0 at the top
    const DRAWN: [[u8; 7]; 6] = [
        [1, 1, 2, 2, 1, 1, 2],
        [1, 1, 2, 2, 1, 1, 2],
        [1, 1, 2, 2, 1, 1, 2],
        [2, 2, 1, 1, 2, 2, 1],
        [1, 1, 2, 2, 1, 1, 2],
        [1, 1, 2, 2, 1, 1, 2],
    ];

    // player two has three in the second row, and can complete it as soon as
    // anyone drops a piece into the empty fourth column
    const TRAP: [[u8; 7]; 6] = [
        [0, 0, 0, 0, 0, 0, 0],
        [0, 0, 0, 0, 0, 0, 0],
        [0, 0, 0, 0, 0, 0, 0],
        [0, 0, 0, 0, 0, 0, 0],
        [2, 2, 2, 0, 0, 0, 0],
        [1, 2, 1, 0, 0, 1, 1],
    ];

    fn engine(difficulty: Difficulty, depth: u32) -> Result<Engine> {
        Ok(Engine::new(EngineConfig {
            difficulty,
            search_depth: Some(depth),
            ..Default::default()
        })?)
    }

    #[test]
    pub fn apply_move_returns_new_board() -> Result<()> {
        let board = Board::from_moves("44")?;
        let next = board.apply_move(3, Player::One)?;

        assert_eq!(board, Board::from_moves("44")?);
        assert_eq!(next.num_moves(), 3);
        assert_eq!(next.cell(3, 3), Some(Cell::Piece(Player::One)));
        assert_eq!(next.cell(4, 3), Some(Cell::Piece(Player::Two)));
        assert_eq!(next.cell(5, 3), Some(Cell::Piece(Player::One)));
        assert_eq!(next.cell(2, 3), Some(Cell::Empty));
        assert_eq!(next.cell(6, 3), None);
        assert_eq!(next.cell(0, 7), None);
        Ok(())
    }

    #[test]
    pub fn column_fills_up() -> Result<()> {
        let mut board = Board::new();
        let mut player = Player::One;
        for _ in 0..6 {
            assert!(board.is_legal(2));
            board = board.apply_move(2, player)?;
            player = player.other();
        }
        assert!(!board.is_legal(2));
        assert_eq!(board.legal_moves(), vec![0, 1, 3, 4, 5, 6]);
        assert_eq!(
            board.apply_move(2, player),
            Err(BoardError::InvalidMove { column: 2 })
        );
        assert_eq!(
            board.apply_move(7, player),
            Err(BoardError::InvalidMove { column: 7 })
        );
        Ok(())
    }

    #[test]
    pub fn move_strings() -> Result<()> {
        let board = Board::from_moves("4453")?;
        assert_eq!(board.heights(), [0, 0, 1, 2, 1, 0, 0]);
        assert_eq!(board.player_to_move(), Player::One);

        assert_eq!(Board::from_moves("48"), Err(BoardError::Parse('8')));
        assert_eq!(Board::from_moves("0"), Err(BoardError::Parse('0')));
        assert_eq!(
            Board::from_moves("1111111"),
            Err(BoardError::InvalidMove { column: 0 })
        );
        Ok(())
    }

    #[test]
    pub fn matrix_form() -> Result<()> {
        let board = Board::from_rows(&TRAP)?;
        assert_eq!(board.to_rows(), TRAP);
        assert_eq!(board.heights(), [2, 2, 2, 0, 0, 1, 1]);
        assert_eq!(board.num_moves(), 8);

        let mut floating = TRAP;
        floating[3][4] = 1;
        assert_eq!(
            Board::from_rows(&floating),
            Err(BoardError::FloatingPiece { row: 3, column: 4 })
        );

        let mut invalid = TRAP;
        invalid[5][3] = 3;
        assert_eq!(
            Board::from_rows(&invalid),
            Err(BoardError::InvalidCell {
                row: 5,
                column: 3,
                value: 3
            })
        );
        Ok(())
    }

    #[test]
    pub fn display() -> Result<()> {
        let board = Board::from_moves("45")?;
        let expected = ".......\n\
                        .......\n\
                        .......\n\
                        .......\n\
                        .......\n\
                        ...XO..\n\
                        0123456";
        assert_eq!(board.to_string(), expected);
        Ok(())
    }

    #[test]
    pub fn canonical_code_ignores_mirroring() -> Result<()> {
        let (left, left_mirrored) = Board::from_moves("12")?.canonical_code();
        let (right, right_mirrored) = Board::from_moves("76")?.canonical_code();
        assert_eq!(left, right);
        assert_ne!(left_mirrored, right_mirrored);

        let (code, mirrored) = Board::from_moves("44")?.canonical_code();
        assert!(!mirrored);
        assert_ne!(code, Board::new().canonical_code().0);
        Ok(())
    }

    #[test]
    pub fn window_count() {
        assert_eq!(WINDOWS.len(), 69);
        for window in WINDOWS.iter() {
            assert!(window.iter().all(|&i| i < 42));
        }
    }

    #[test]
    pub fn wins_in_every_direction() -> Result<()> {
        let horizontal = Board::from_moves("1122334")?;
        assert!(check_win(&horizontal, Player::One));
        assert!(!check_win(&horizontal, Player::Two));

        let vertical = Board::from_moves("1212121")?;
        assert!(check_win(&vertical, Player::One));
        assert!(!check_win(&vertical, Player::Two));

        let rising = Board::from_rows(&[
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 1, 0, 0, 0],
            [0, 0, 1, 1, 0, 0, 0],
            [0, 1, 2, 2, 0, 0, 0],
            [1, 2, 2, 2, 0, 0, 0],
        ])?;
        assert!(check_win(&rising, Player::One));
        assert!(!check_win(&rising, Player::Two));

        let falling = Board::from_rows(&[
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 2, 0, 0, 0],
            [0, 0, 0, 1, 2, 0, 0],
            [0, 0, 0, 1, 1, 2, 0],
            [0, 0, 0, 1, 1, 1, 2],
        ])?;
        assert!(check_win(&falling, Player::Two));
        assert!(!check_win(&falling, Player::One));
        assert_eq!(winner(&falling), Some(Player::Two));

        // three in a row is not a win
        let three = Board::from_moves("112233")?;
        assert!(!check_win(&three, Player::One));
        assert!(!is_terminal(&three));
        Ok(())
    }

    #[test]
    pub fn full_board_is_terminal() -> Result<()> {
        let board = Board::from_rows(&DRAWN)?;
        assert!(board.is_full());
        assert_eq!(winner(&board), None);
        assert!(is_terminal(&board));
        assert!(board.legal_moves().is_empty());
        Ok(())
    }

    #[test]
    pub fn winning_columns_are_ascending() -> Result<()> {
        // player one can complete the bottom row at either end
        let board = Board::from_moves("223344")?;
        assert_eq!(winning_columns(&board, Player::One), vec![0, 4]);
        assert!(winning_columns(&board, Player::Two).is_empty());
        Ok(())
    }

    #[test]
    pub fn evaluation() -> Result<()> {
        assert_eq!(evaluate(&Board::new(), Player::One), 0);

        let centre = Board::from_moves("4")?;
        assert_eq!(evaluate(&centre, Player::One), 100);
        assert_eq!(evaluate(&centre, Player::Two), -100);

        // player one threatens to complete the bottom row
        let threat = Board::from_moves("15253")?;
        assert!(evaluate(&threat, Player::Two) < -EvalWeights::DEFAULT.opponent_three + 1_000);
        assert!(evaluate(&threat, Player::One) > 0);

        let bound = score_bound(&EvalWeights::DEFAULT);
        assert!(bound < WIN_SENTINEL);
        assert!(evaluate(&Board::from_moves("1122334")?, Player::One).abs() <= bound);
        Ok(())
    }

    #[test]
    pub fn minimax_scores_finished_games() -> Result<()> {
        let won = Board::from_moves("1122334")?;
        assert_eq!(minimax(&won, 3, -INFINITY, INFINITY, false, Player::One), WIN_SENTINEL + 3);
        assert_eq!(minimax(&won, 0, -INFINITY, INFINITY, true, Player::Two), -WIN_SENTINEL);

        let drawn = Board::from_rows(&DRAWN)?;
        assert_eq!(minimax(&drawn, 4, -INFINITY, INFINITY, true, Player::One), 0);

        // at depth zero the heuristic is used
        let centre = Board::from_moves("4")?;
        assert_eq!(minimax(&centre, 0, -INFINITY, INFINITY, false, Player::One), 100);
        Ok(())
    }

    #[test]
    pub fn minimax_sees_the_reply() -> Result<()> {
        let board = Board::from_rows(&TRAP)?;
        let losing = board.apply_move(3, Player::One)?;
        assert_eq!(
            minimax(&losing, 1, -INFINITY, INFINITY, false, Player::One),
            -WIN_SENTINEL
        );

        let safe = board.apply_move(4, Player::One)?;
        assert!(minimax(&safe, 1, -INFINITY, INFINITY, false, Player::One) > -WIN_SENTINEL);
        Ok(())
    }

    #[test]
    pub fn search_times_out() -> Result<()> {
        let mut search = Search::new(Player::One).with_deadline(Some(std::time::Instant::now()));
        let result = search.minimax(&Board::new(), 6, -INFINITY, INFINITY, false);
        assert_eq!(result, Err(SearchError::Timeout));
        Ok(())
    }

    #[test]
    pub fn every_tier_takes_a_win() -> Result<()> {
        // both players have three in a column, player one to move
        let board = Board::from_moves("121212")?;
        for &difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard].iter() {
            let decision = engine(difficulty, 4)?.decide(&board, Player::One, &mut StdRng::seed_from_u64(1));
            assert_eq!(decision.column, 0);
            assert_eq!(decision.kind, DecisionKind::Win);
        }
        Ok(())
    }

    #[test]
    pub fn medium_and_hard_block() -> Result<()> {
        // player one threatens the bottom row, player two to move
        let board = Board::from_moves("17273")?;
        for &difficulty in [Difficulty::Medium, Difficulty::Hard].iter() {
            let decision = engine(difficulty, 4)?.decide(&board, Player::Two, &mut StdRng::seed_from_u64(1));
            assert_eq!(decision.column, 3);
            assert_eq!(decision.kind, DecisionKind::Block);
        }
        Ok(())
    }

    #[test]
    pub fn hard_avoids_giving_away_a_win() -> Result<()> {
        let board = Board::from_rows(&TRAP)?;
        assert!(winning_columns(&board, Player::One).is_empty());
        assert!(winning_columns(&board, Player::Two).is_empty());

        for depth in 2..=4 {
            let decision = engine(Difficulty::Hard, depth)?.decide(&board, Player::One, &mut StdRng::seed_from_u64(1));
            assert_ne!(decision.column, 3);
            match decision.kind {
                DecisionKind::Search { score } => assert!(score > -WIN_SENTINEL),
                kind => panic!("unexpected decision {:?}", kind),
            }
        }
        Ok(())
    }

    #[test]
    pub fn hard_is_deterministic() -> Result<()> {
        let board = Board::from_moves("4433")?;
        let engine = engine(Difficulty::Hard, 5)?;
        let first = engine.decide(&board, Player::One, &mut StdRng::seed_from_u64(1));
        for seed in 2..5 {
            assert_eq!(engine.decide(&board, Player::One, &mut StdRng::seed_from_u64(seed)), first);
        }
        Ok(())
    }

    #[test]
    pub fn opening_move_is_central() -> Result<()> {
        for depth in 4..=6 {
            let column = get_move(
                &Board::new(),
                Player::One,
                Difficulty::Hard,
                depth,
                None,
                &mut StdRng::seed_from_u64(0),
            );
            assert_eq!(column, 3);
        }
        Ok(())
    }

    #[test]
    pub fn full_board_falls_back() -> Result<()> {
        let board = Board::from_rows(&DRAWN)?;
        for &difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard].iter() {
            let decision = engine(difficulty, 4)?.decide(&board, Player::One, &mut StdRng::seed_from_u64(1));
            assert_eq!(decision.column, 0);
            assert_eq!(decision.kind, DecisionKind::Fallback);
        }
        Ok(())
    }

    #[test]
    pub fn expired_deadline_falls_back_to_a_legal_move() -> Result<()> {
        let engine = Engine::new(EngineConfig {
            search_depth: Some(6),
            move_deadline_ms: Some(0),
            ..Default::default()
        })?;
        let board = Board::from_moves("444444")?;
        let decision = engine.decide(&board, Player::One, &mut StdRng::seed_from_u64(3));
        assert_eq!(decision.kind, DecisionKind::Fallback);
        assert!(board.is_legal(decision.column));
        Ok(())
    }

    #[test]
    pub fn random_tiers_use_the_given_rng() -> Result<()> {
        let board = Board::from_moves("4444")?;
        for &difficulty in [Difficulty::Easy, Difficulty::Medium].iter() {
            let engine = engine(difficulty, 1)?;
            for seed in 0..20 {
                let first = engine.decide(&board, Player::One, &mut StdRng::seed_from_u64(seed));
                let second = engine.decide(&board, Player::One, &mut StdRng::seed_from_u64(seed));
                assert_eq!(first, second);
                assert_eq!(first.kind, DecisionKind::Random);
                assert!(board.is_legal(first.column));
            }
        }
        Ok(())
    }

    #[test]
    pub fn ties_go_to_the_lowest_column() {
        let results = vec![
            BranchResult { column: 1, score: Ok(5), node_count: 1 },
            BranchResult { column: 2, score: Err(SearchError::Timeout), node_count: 1 },
            BranchResult { column: 4, score: Ok(9), node_count: 1 },
            BranchResult { column: 6, score: Ok(9), node_count: 1 },
        ];
        assert_eq!(select_best(&results), Some((4, 9)));

        let reversed: Vec<_> = results.into_iter().rev().collect();
        assert_eq!(select_best(&reversed), Some((4, 9)));

        let failed = vec![BranchResult { column: 0, score: Err(SearchError::Timeout), node_count: 0 }];
        assert_eq!(select_best(&failed), None);
    }

    #[test]
    pub fn lookup_table_round_trip() -> Result<()> {
        let table = LookupTable::from_records(vec![
            (Board::new(), Player::One, 3),
            (Board::from_moves("1")?, Player::Two, 1),
            (Board::from_moves("44")?, Player::One, 2),
            // duplicate of the first record, ignored
            (Board::new(), Player::One, 0),
        ]);
        assert_eq!(table.len(), 3);

        let mut bytes = Vec::new();
        table.write_to(&mut bytes)?;
        assert_eq!(&bytes[..4], b"C4LT");
        assert_eq!(bytes.len(), 4 + 2 + 4 + 3 * 18);

        let loaded = LookupTable::read_from(&bytes[..])?;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(&Board::new(), Player::One), Some(3));
        assert_eq!(loaded.get(&Board::new(), Player::Two), None);
        assert_eq!(loaded.get(&Board::from_moves("44")?, Player::One), Some(2));
        Ok(())
    }

    #[test]
    pub fn lookup_table_mirrors_columns() -> Result<()> {
        let table = LookupTable::from_records(vec![(Board::from_moves("1")?, Player::Two, 1)]);
        assert_eq!(table.get(&Board::from_moves("1")?, Player::Two), Some(1));
        assert_eq!(table.get(&Board::from_moves("7")?, Player::Two), Some(5));
        assert_eq!(table.get(&Board::from_moves("2")?, Player::Two), None);
        Ok(())
    }

    #[test]
    pub fn lookup_table_rejects_bad_files() -> Result<()> {
        assert!(LookupTable::read_from(&b"NOPE\x00\x01\x00\x00\x00\x00"[..]).is_err());
        assert!(LookupTable::read_from(&b"C4LT\x00\x02\x00\x00\x00\x00"[..]).is_err());

        let mut bytes = b"C4LT\x00\x01\x00\x00\x00\x02".to_vec();
        for &code in [5u8, 3].iter() {
            bytes.extend_from_slice(&[0; 15]);
            bytes.extend_from_slice(&[code, 1, 0]);
        }
        assert!(LookupTable::read_from(&bytes[..]).is_err());

        let mut bytes = b"C4LT\x00\x01\x00\x00\x00\x01".to_vec();
        bytes.extend_from_slice(&[0; 16]);
        bytes.extend_from_slice(&[1, 9]);
        assert!(LookupTable::read_from(&bytes[..]).is_err());

        let empty = LookupTable::read_from(&b"C4LT\x00\x01\x00\x00\x00\x00"[..])?;
        assert!(empty.is_empty());
        Ok(())
    }

    #[test]
    pub fn move_quality_is_bounded() -> Result<()> {
        let board = Board::from_moves("121212")?;
        assert_eq!(move_quality(&board, 0, Player::One), MAX_QUALITY);
        assert_eq!(move_quality(&board, 1, Player::One), MAX_QUALITY / 2);
        assert_eq!(move_quality(&Board::from_moves("111111")?, 0, Player::One), -MAX_QUALITY);
        assert_eq!(move_quality(&Board::new(), 3, Player::One), MAX_QUALITY / 10);
        assert_eq!(move_quality(&Board::new(), 0, Player::One), 0);
        Ok(())
    }

    #[test]
    pub fn table_blends_into_leaf_scores() -> Result<()> {
        let known = Board::new();
        let unknown = Board::from_moves("4")?;
        let table = LookupTable::from_records(vec![(known, Player::One, 3)]);
        let blend = BlendWeights::default();

        let search = Search::new(Player::One).with_overlay(Some(Overlay { table: &table, blend }));
        let expected = blend.mix(evaluate(&known, Player::One), move_quality(&known, 3, Player::One));
        assert_eq!(expected, 30);
        assert_eq!(search.leaf_score(&known), expected);
        assert_eq!(search.leaf_score(&unknown), evaluate(&unknown, Player::One));

        // the table is keyed on the root player
        let search = Search::new(Player::Two).with_overlay(Some(Overlay { table: &table, blend }));
        assert_eq!(search.leaf_score(&known), 0);
        Ok(())
    }

    #[test]
    pub fn blend_weights() {
        let blend = BlendWeights { heuristic: 70, table: 30 };
        assert_eq!(blend.mix(1000, 0), 700);
        assert_eq!(blend.mix(0, 1000), 300);
        assert_eq!(BlendWeights { heuristic: 1, table: 0 }.mix(-77, 1000), -77);

        // the weights may sum past u32::MAX
        let heavy = BlendWeights { heuristic: u32::MAX, table: 1 };
        assert_eq!(heavy.mix(1000, 0), 999);
        assert_eq!(heavy.mix(-1000, 0), -999);
        let even = BlendWeights { heuristic: u32::MAX, table: u32::MAX };
        assert_eq!(even.mix(-1000, 1000), 0);
        assert_eq!(even.mix(1000, 1000), 1000);
    }

    #[test]
    pub fn extreme_blend_weights_search_normally() -> Result<()> {
        let config = EngineConfig::from_json_str(
            r#"{ "search_depth": 1, "blend": { "heuristic": 4294967295, "table": 1 } }"#,
        )?;
        // keyed on the position after the root player opens in the centre
        let table = LookupTable::from_records(vec![(Board::from_moves("4")?, Player::One, 3)]);
        let engine = Engine::with_table(config, Some(table))?;

        let decision = engine.decide(&Board::new(), Player::One, &mut StdRng::seed_from_u64(0));
        assert!(Board::new().is_legal(decision.column));
        assert!(matches!(decision.kind, DecisionKind::Search { .. }));
        Ok(())
    }

    #[test]
    pub fn generated_table_prefers_the_centre() -> Result<()> {
        let table = LookupTable::generate(2, 2)?;
        // the empty board, 4 first moves and 25 replies, up to mirroring
        assert_eq!(table.len(), 1 + 4 + 25);
        assert_eq!(table.get(&Board::new(), Player::One), Some(3));

        let engine = Engine::with_table(
            EngineConfig {
                search_depth: Some(3),
                ..Default::default()
            },
            Some(table),
        )?;
        let board = Board::from_moves("4")?;
        assert!(board.is_legal(engine.get_move(&board, Player::Two, &mut StdRng::seed_from_u64(0))));
        Ok(())
    }

    #[test]
    pub fn missing_table_is_not_fatal() -> Result<()> {
        let engine = Engine::new(EngineConfig {
            lookup_table_path: Some("no/such/lookup_table.bin".into()),
            ..Default::default()
        })?;
        assert!(engine.table().is_none());
        Ok(())
    }

    #[test]
    pub fn config_from_json() -> Result<()> {
        let config = EngineConfig::from_json_str(
            r#"{
                "difficulty": "EASY",
                "search_depth": 3,
                "threads": 2,
                "branch_timeout_ms": 250,
                "move_deadline_ms": 1000,
                "blend": { "heuristic": 50, "table": 50 }
            }"#,
        )?;
        assert_eq!(config.difficulty, Difficulty::Easy);
        assert_eq!(config.depth(), 3);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.branch_timeout().as_millis(), 250);
        assert_eq!(config.move_deadline().map(|d| d.as_millis()), Some(1000));
        assert_eq!(config.blend, BlendWeights { heuristic: 50, table: 50 });

        let defaults = EngineConfig::from_json_str("{}")?;
        assert_eq!(defaults, EngineConfig::default());
        assert_eq!(defaults.depth(), 6);
        assert_eq!(defaults.branch_timeout().as_millis(), 5000);
        Ok(())
    }

    #[test]
    pub fn config_validation() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "search_depth": 0 }"#),
            Err(ConfigError::InvalidDepth)
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "threads": 0 }"#),
            Err(ConfigError::InvalidThreads)
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "blend": { "heuristic": 0, "table": 0 } }"#),
            Err(ConfigError::InvalidBlend)
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "difficulty": "IMPOSSIBLE" }"#),
            Err(ConfigError::Json(_))
        ));
        // a zero depth is fine for the tiers that never search
        assert!(EngineConfig::from_json_str(r#"{ "difficulty": "MEDIUM", "search_depth": 0 }"#).is_ok());

        assert_eq!("hard".parse::<Difficulty>().ok(), Some(Difficulty::Hard));
        assert!("expert".parse::<Difficulty>().is_err());
    }
}
