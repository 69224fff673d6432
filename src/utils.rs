use crate::engine::{CellKind, Map, MapError, Pos, Puzzle, State};

/// Parses the stone weight line: whitespace-separated positive integers.
///
/// A first line that looks like grid content (it contains a wall) means the weight
/// line was left out entirely.
fn parse_weights(line: &str) -> Result<Vec<u32>, MapError> {
    if line.contains('#') {
        return Err(MapError::MissingWeights);
    }
    line.split_whitespace()
        .enumerate()
        .map(|(index, token)| match token.parse::<u32>() {
            Ok(0) => Err(MapError::NonPositiveWeight { index }),
            Ok(weight) => Ok(weight),
            Err(_) => Err(MapError::InvalidWeight(token.to_string())),
        })
        .collect()
}

/// Parses a puzzle from its text form.
///
/// The first line holds the stone weights, in the same order stones are met when
/// scanning the grid row by row. Every following line is a grid row using the legend:
/// - `#`: wall
/// - `.`: empty target
/// - `@`: agent, `+`: agent on a target
/// - `$`: stone, `*`: stone on a target
/// - space or any other character: floor
///
/// The first line is always the weight line; an empty one means the puzzle has no
/// stones. Trailing blank lines are ignored. Leading spaces on grid rows are kept
/// because they are floor cells.
///
/// # Returns
/// * `Ok(Puzzle)` with stones indexed in scan order.
/// * `Err(MapError)` if the weight line is missing or malformed, the grid is empty,
///   there is no agent or more than one, the stone, weight and target counts differ,
///   the agent's area is not enclosed by walls, or a stone lies outside that area.
///
/// # Examples
/// ```
/// use weighted_sokoban::engine::MapError;
/// use weighted_sokoban::utils::puzzle_from_str;
///
/// let puzzle = puzzle_from_str("3 1\n#######\n#@$$..#\n#######").unwrap();
/// assert_eq!(puzzle.map().weights(), &[3, 1]);
/// assert_eq!(puzzle.initial_state().stones(), &[(1, 2), (1, 3)]);
///
/// assert_eq!(
///     puzzle_from_str("#####\n#@$.#\n#####").unwrap_err(),
///     MapError::MissingWeights
/// );
/// ```
pub fn puzzle_from_str(input: &str) -> Result<Puzzle, MapError> {
    let mut lines = input.lines().map(|line| line.trim_end_matches('\r'));

    let weights = match lines.next() {
        Some(line) => parse_weights(line)?,
        None => return Err(MapError::MissingWeights),
    };

    let mut grid: Vec<&str> = lines.collect();
    while grid.last().is_some_and(|line| line.trim().is_empty()) {
        grid.pop();
    }

    let mut agent: Option<Pos> = None;
    let mut stones = Vec::new();
    let mut rows = Vec::with_capacity(grid.len());
    for (r, line) in grid.iter().enumerate() {
        let mut row = Vec::with_capacity(line.len());
        for (c, ch) in line.chars().enumerate() {
            match ch {
                '@' | '+' => {
                    if agent.is_some() {
                        return Err(MapError::MultipleAgents { row: r, col: c });
                    }
                    agent = Some((r, c));
                }
                '$' | '*' => stones.push((r, c)),
                _ => {}
            }
            row.push(CellKind::from_char(ch));
        }
        rows.push(row);
    }

    let map = Map::new(rows, weights)?;
    let agent = agent.ok_or(MapError::NoAgent)?;
    Puzzle::new(map, agent, stones)
}

/// Marks the interior of the map: the non-wall cells reachable from `agent`.
///
/// Floor outside this region (e.g. the space around an irregular outer wall) is
/// exterior dead space. The result is purely a display annotation; it plays no part
/// in move legality.
pub fn interior_cells(map: &Map, agent: Pos) -> Vec<Vec<bool>> {
    let region = map
        .enclosed_region(agent)
        .unwrap_or_else(|_| vec![false; map.height() * map.width()]);
    region
        .chunks(map.width())
        .map(<[bool]>::to_vec)
        .collect()
}

fn legend_char(map: &Map, state: &State, pos: Pos) -> char {
    let on_target = map.is_target(pos);
    if state.agent() == pos {
        if on_target {
            '+'
        } else {
            '@'
        }
    } else if state.stone_at(pos).is_some() {
        if on_target {
            '*'
        } else {
            '$'
        }
    } else {
        map.cell_kind(pos).to_char()
    }
}

/// Renders a state in the map legend, one grid row per line.
///
/// The output parses back into the same grid and positions with `puzzle_from_str`
/// once a weight line is prepended. Trailing spaces are trimmed from each row.
pub fn render_state(map: &Map, state: &State) -> String {
    (0..map.height())
        .map(|r| {
            let row: String = (0..map.width())
                .map(|c| legend_char(map, state, (r, c)))
                .collect();
            row.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the ANSI background colour code for a rendered cell.
fn to_ansi_color_code(map: &Map, state: &State, pos: Pos, interior: bool) -> &'static str {
    if state.agent() == pos {
        "44"
    } else if state.stone_at(pos).is_some() {
        if map.is_target(pos) {
            "42"
        } else {
            "43"
        }
    } else {
        match map.cell_kind(pos) {
            CellKind::Wall => "100",
            CellKind::Target => "102",
            CellKind::Floor if interior => "47",
            CellKind::Floor => "40",
        }
    }
}

/// Renders a state for a terminal with ANSI colours.
///
/// Stones are labelled with their index (mod 10) so pushes can be followed by eye.
/// Interior floor and exterior dead space get different backgrounds.
pub fn render_state_colored(map: &Map, state: &State) -> String {
    let interior = interior_cells(map, state.agent());
    let mut output = String::new();
    for r in 0..map.height() {
        for c in 0..map.width() {
            let pos = (r, c);
            let code = to_ansi_color_code(map, state, pos, interior[r][c]);
            let content = match state.stone_at(pos) {
                Some(index) => format!("{:>2}", index % 10),
                None if state.agent() == pos => " @".to_string(),
                None => "  ".to_string(),
            };
            output.push_str(&format!("\x1b[1;30;{}m{}\x1b[m", code, content));
        }
        if r < map.height() - 1 {
            output.push('\n');
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_puzzle_from_str_valid() {
        let puzzle = puzzle_from_str(
            "1 2\n\
             #######\n\
             #@ $  #\n\
             # .$. #\n\
             #######",
        )
        .unwrap();
        assert_eq!(puzzle.map().height(), 4);
        assert_eq!(puzzle.map().width(), 7);
        assert_eq!(puzzle.initial_state().agent(), (1, 1));
        assert_eq!(puzzle.initial_state().stones(), &[(1, 3), (2, 3)]);
        assert_eq!(puzzle.map().targets(), &[(2, 2), (2, 4)]);
        assert_eq!(puzzle.map().weights(), &[1, 2]);
    }

    #[test]
    fn test_puzzle_from_str_agent_and_stone_on_target() {
        let puzzle = puzzle_from_str("5 1\n######\n#+$ *#\n######").unwrap();
        assert_eq!(puzzle.initial_state().agent(), (1, 1));
        assert_eq!(puzzle.initial_state().stones(), &[(1, 2), (1, 4)]);
        assert_eq!(puzzle.map().targets(), &[(1, 1), (1, 4)]);
        assert!(!puzzle.is_solved());
    }

    #[test]
    fn test_puzzle_from_str_crlf_and_blank_lines() {
        let puzzle = puzzle_from_str("2\r\n#####\r\n#@$.#\r\n#####\r\n\n").unwrap();
        assert_eq!(puzzle.map().width(), 5);
        assert_eq!(puzzle.map().height(), 3);
    }

    #[test]
    fn test_puzzle_from_str_empty_weight_line_means_no_stones() {
        let puzzle = puzzle_from_str("\n#####\n#@  #\n#####").unwrap();
        assert_eq!(puzzle.map().stone_count(), 0);
        assert!(puzzle.initial_state().stones().is_empty());
        assert!(puzzle.is_solved());

        assert_eq!(
            puzzle_from_str("\n#####\n#@$.#\n#####"),
            Err(MapError::WeightCountMismatch {
                stones: 1,
                weights: 0
            })
        );
    }

    #[test]
    fn test_puzzle_from_str_errors() {
        assert_eq!(puzzle_from_str(""), Err(MapError::MissingWeights));
        assert_eq!(
            puzzle_from_str("#####\n#@$.#\n#####"),
            Err(MapError::MissingWeights)
        );
        assert_eq!(
            puzzle_from_str("1 x\n#####\n#@$.#\n#####"),
            Err(MapError::InvalidWeight("x".to_string()))
        );
        assert_eq!(
            puzzle_from_str("0\n#####\n#@$.#\n#####"),
            Err(MapError::NonPositiveWeight { index: 0 })
        );
        assert_eq!(puzzle_from_str("1\n"), Err(MapError::EmptyGrid));
        assert_eq!(
            puzzle_from_str("1\n#####\n# $.#\n#####"),
            Err(MapError::NoAgent)
        );
        assert_eq!(
            puzzle_from_str("1\n######\n#@$.@#\n######"),
            Err(MapError::MultipleAgents { row: 1, col: 4 })
        );
        assert_eq!(
            puzzle_from_str("1 1\n#####\n#@$.#\n#####"),
            Err(MapError::WeightCountMismatch {
                stones: 1,
                weights: 2
            })
        );
        assert_eq!(
            puzzle_from_str("1\n######\n#@$..#\n######"),
            Err(MapError::TargetCountMismatch {
                stones: 1,
                targets: 2
            })
        );
        assert_eq!(
            puzzle_from_str("1\n#####\n#@$. \n#####"),
            Err(MapError::OpenBoundary { row: 1, col: 4 })
        );
    }

    #[test]
    fn test_render_state_round_trip() {
        let text = "#######\n#@ $  #\n# .*  #\n#######";
        let puzzle = puzzle_from_str(&format!("1 2\n{}", text)).unwrap();
        assert_eq!(render_state(puzzle.map(), puzzle.initial_state()), text);
        assert_eq!(puzzle.to_string(), text);

        let replay = puzzle.replay("rR").unwrap();
        assert_eq!(
            render_state(puzzle.map(), replay.final_state()),
            "#######\n#  @$ #\n# .*  #\n#######"
        );
    }

    #[test]
    fn test_render_state_agent_on_target() {
        let puzzle = puzzle_from_str("1\n######\n#+$  #\n######").unwrap();
        assert_eq!(
            render_state(puzzle.map(), puzzle.initial_state()),
            "######\n#+$  #\n######"
        );
    }

    #[test]
    fn test_interior_cells_excludes_exterior_floor() {
        let puzzle = puzzle_from_str(
            "1\n\
             \x20 #####\n\
             ###@$.#\n\
             \x20 #####",
        )
        .unwrap();
        let interior = interior_cells(puzzle.map(), puzzle.initial_state().agent());
        assert!(!interior[0][0]);
        assert!(!interior[1][0]);
        assert!(interior[1][3]);
        assert!(interior[1][4]);
        assert!(interior[1][5]);
        assert_eq!(interior.iter().flatten().filter(|&&inside| inside).count(), 3);
    }

    #[test]
    fn test_render_state_colored_shape() {
        let puzzle = puzzle_from_str("1\n#####\n#@$.#\n#####").unwrap();
        let rendered = render_state_colored(puzzle.map(), puzzle.initial_state());
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("\x1b[1;30;44m @\x1b[m"));
        assert!(rendered.contains("\x1b[1;30;43m 0\x1b[m"));
        assert!(rendered.contains("\x1b[1;30;102m  \x1b[m"));
    }
}
