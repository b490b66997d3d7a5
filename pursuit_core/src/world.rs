use serde::{Deserialize, Serialize};

use crate::{Position, error::ConfigError, map::Grid};

/// Minimum number of free cells: two pursuers and one target, each on its own cell.
pub const MIN_FREE_CELLS: usize = 3;

/// Represents the static type of a cell in the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Free,
    Obstacle,
}

/// The five discrete moves shared by every entity.
///
/// The declaration order is the canonical enumeration order used when
/// generating successors and candidate moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Stay = 0,
    North = 1,
    South = 2,
    West = 3,
    East = 4,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Stay,
        Action::North,
        Action::South,
        Action::West,
        Action::East,
    ];

    /// Returns the (row, col) delta applied by this move.
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Action::Stay => (0, 0),
            Action::North => (-1, 0),
            Action::South => (1, 0),
            Action::West => (0, -1),
            Action::East => (0, 1),
        }
    }

    /// Discrete action value in `0..5`.
    pub const fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Action> {
        Action::ALL.get(usize::from(index)).copied()
    }
}

/// The static playing field: dimensions and obstacles.
///
/// Immutable once constructed; every invariant is checked by [`GridWorld::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorldLayout", into = "WorldLayout")]
pub struct GridWorld {
    terrain: Grid<Cell>,
    free_cells: usize,
}

/// Serialized form of a [`GridWorld`]. Decoding goes through [`GridWorld::new`].
#[derive(Serialize, Deserialize)]
struct WorldLayout {
    height: usize,
    width: usize,
    obstacles: Vec<Position>,
}

impl TryFrom<WorldLayout> for GridWorld {
    type Error = ConfigError;

    fn try_from(layout: WorldLayout) -> Result<Self, Self::Error> {
        GridWorld::new(layout.height, layout.width, layout.obstacles)
    }
}

impl From<GridWorld> for WorldLayout {
    fn from(world: GridWorld) -> Self {
        WorldLayout {
            height: world.height(),
            width: world.width(),
            obstacles: world.obstacles(),
        }
    }
}

impl GridWorld {
    /// Builds a world of `height` rows by `width` columns with the given obstacles.
    ///
    /// Duplicate obstacles are collapsed. Fails if a dimension is zero or the
    /// cell count does not fit in memory, an obstacle lies out of bounds, or
    /// fewer than [`MIN_FREE_CELLS`] cells remain.
    pub fn new<I>(height: usize, width: usize, obstacles: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Position>,
    {
        let too_large = height
            .checked_mul(width)
            .is_none_or(|cells| cells > isize::MAX as usize);
        if height < 1 || width < 1 || too_large {
            return Err(ConfigError::InvalidDimensions { height, width });
        }
        let mut terrain = Grid::from_generator(height, width, |_, _| Cell::Free);
        for obstacle in obstacles {
            terrain
                .set(obstacle, Cell::Obstacle)
                .map_err(|_| ConfigError::ObstacleOutOfBounds {
                    row: obstacle.row,
                    col: obstacle.col,
                    height,
                    width,
                })?;
        }

        let free_cells = terrain.enumerate().filter(|(_, c)| **c == Cell::Free).count();
        if free_cells < MIN_FREE_CELLS {
            return Err(ConfigError::InsufficientFreeCells { free: free_cells });
        }

        Ok(GridWorld {
            terrain,
            free_cells,
        })
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.terrain.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.terrain.width()
    }

    pub fn terrain(&self) -> &Grid<Cell> {
        &self.terrain
    }

    /// True iff `pos` is inside the grid and not an obstacle.
    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        matches!(self.terrain.get(pos), Some(Cell::Free))
    }

    pub fn is_obstacle(&self, pos: Position) -> bool {
        matches!(self.terrain.get(pos), Some(Cell::Obstacle))
    }

    /// The cell `action` would lead to from `pos`, if it is inside the grid.
    ///
    /// Obstacles are not considered; combine with [`GridWorld::is_valid`].
    pub fn offset(&self, pos: Position, action: Action) -> Option<Position> {
        let (dr, dc) = action.delta();
        let row = pos.row.checked_add_signed(dr)?;
        let col = pos.col.checked_add_signed(dc)?;
        self.terrain
            .contains(row, col)
            .then_some(Position::new(row, col))
    }

    /// The cell reached by taking `action` from `pos`, or `None` if it is blocked.
    pub fn step_from(&self, pos: Position, action: Action) -> Option<Position> {
        self.offset(pos, action).filter(|next| self.is_valid(*next))
    }

    /// All free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Position> {
        self.terrain
            .enumerate()
            .filter_map(|(pos, cell)| (*cell == Cell::Free).then_some(pos))
            .collect()
    }

    pub fn free_cell_count(&self) -> usize {
        self.free_cells
    }

    /// All obstacle cells in row-major order.
    pub fn obstacles(&self) -> Vec<Position> {
        self.terrain
            .enumerate()
            .filter_map(|(pos, cell)| (*cell == Cell::Obstacle).then_some(pos))
            .collect()
    }
}

/// Loads a world from a text map.
///
/// Each non-empty line is one row; `.` is a free cell and `#` an obstacle.
/// Whitespace between cells is ignored, so both `.#.` and `. # .` parse.
pub fn load_world_from_string(map_string: &str) -> Result<GridWorld, ConfigError> {
    // Keep 1-based file line numbers so errors point at the right line.
    let lines: Vec<(usize, &str)> = map_string
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(ConfigError::Map {
            line: 0,
            reason: "map is empty".to_string(),
        });
    }

    let height = lines.len();
    let mut width = 0;
    let mut obstacles = Vec::new();

    for (row, &(line_no, line)) in lines.iter().enumerate() {
        let tokens: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
        if row == 0 {
            width = tokens.len();
        } else if tokens.len() != width {
            return Err(ConfigError::Map {
                line: line_no,
                reason: format!("expected {} cells, found {}", width, tokens.len()),
            });
        }
        for (col, token) in tokens.into_iter().enumerate() {
            match token {
                '.' => {}
                '#' => obstacles.push(Position::new(row, col)),
                unknown => {
                    return Err(ConfigError::Map {
                        line: line_no,
                        reason: format!("unknown map code '{unknown}' at column {}", col + 1),
                    });
                }
            }
        }
    }

    GridWorld::new(height, width, obstacles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_WALLS: [Position; 0] = [];

    #[test]
    fn test_rejects_zero_dimensions() {
        assert_eq!(
            GridWorld::new(0, 5, NO_WALLS),
            Err(ConfigError::InvalidDimensions {
                height: 0,
                width: 5
            })
        );
        assert!(GridWorld::new(5, 0, NO_WALLS).is_err());
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        assert_eq!(
            GridWorld::new(usize::MAX, 2, NO_WALLS),
            Err(ConfigError::InvalidDimensions {
                height: usize::MAX,
                width: 2
            })
        );
        assert!(matches!(
            GridWorld::new(usize::MAX / 2, 4, NO_WALLS),
            Err(ConfigError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let world = GridWorld::new(3, 3, [Position::new(1, 1)]).unwrap();
        let json = serde_json::to_string(&world).unwrap();
        let decoded: GridWorld = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, world);
        assert_eq!(decoded.free_cell_count(), 8);

        let walled_in = r#"{"height":1,"width":1,"obstacles":[{"row":0,"col":0}]}"#;
        assert!(serde_json::from_str::<GridWorld>(walled_in).is_err());
        let raw_cells = r#"{"terrain":{"height":1,"width":1,"cells":["Obstacle"]},"free_cells":99}"#;
        assert!(serde_json::from_str::<GridWorld>(raw_cells).is_err());
        let huge = r#"{"height":18446744073709551615,"width":2,"obstacles":[]}"#;
        assert!(serde_json::from_str::<GridWorld>(huge).is_err());
    }

    #[test]
    fn test_rejects_out_of_bounds_obstacle() {
        let err = GridWorld::new(3, 3, [Position::new(3, 0)]).unwrap_err();
        assert!(matches!(err, ConfigError::ObstacleOutOfBounds { row: 3, col: 0, .. }));
    }

    #[test]
    fn test_rejects_too_few_free_cells() {
        assert_eq!(
            GridWorld::new(1, 2, NO_WALLS),
            Err(ConfigError::InsufficientFreeCells { free: 2 })
        );
        let walls = [Position::new(0, 0), Position::new(0, 1)];
        assert!(GridWorld::new(2, 2, walls).is_err());
        assert!(GridWorld::new(1, 3, NO_WALLS).is_ok());
    }

    #[test]
    fn test_duplicate_obstacles_collapse() {
        let walls = [Position::new(1, 1), Position::new(1, 1)];
        let world = GridWorld::new(3, 3, walls).unwrap();
        assert_eq!(world.free_cell_count(), 8);
        assert_eq!(world.obstacles(), vec![Position::new(1, 1)]);
    }

    #[test]
    fn test_is_valid() {
        let world = GridWorld::new(3, 4, [Position::new(1, 2)]).unwrap();
        assert!(world.is_valid(Position::new(0, 0)));
        assert!(world.is_valid(Position::new(2, 3)));
        assert!(!world.is_valid(Position::new(1, 2)));
        assert!(!world.is_valid(Position::new(3, 0)));
        assert!(!world.is_valid(Position::new(0, 4)));
    }

    #[test]
    fn test_offset_and_step_from() {
        let world = GridWorld::new(3, 3, [Position::new(0, 1)]).unwrap();
        let corner = Position::new(0, 0);
        assert_eq!(world.offset(corner, Action::North), None);
        assert_eq!(world.offset(corner, Action::West), None);
        assert_eq!(world.offset(corner, Action::East), Some(Position::new(0, 1)));
        assert_eq!(world.step_from(corner, Action::East), None);
        assert_eq!(world.step_from(corner, Action::South), Some(Position::new(1, 0)));
        assert_eq!(world.step_from(corner, Action::Stay), Some(corner));
    }

    #[test]
    fn test_action_indices() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(usize::from(action.index()), i);
            assert_eq!(Action::from_index(i as u8), Some(*action));
        }
        assert_eq!(Action::from_index(5), None);
    }

    #[test]
    fn test_load_world_from_string() {
        let world = load_world_from_string(
            "
            . . #
            . # .
            . . .
            ",
        )
        .unwrap();
        assert_eq!((world.height(), world.width()), (3, 3));
        assert_eq!(world.obstacles(), vec![Position::new(0, 2), Position::new(1, 1)]);

        let packed = load_world_from_string("..#\n.#.\n...").unwrap();
        assert_eq!(packed, world);
    }

    #[test]
    fn test_load_world_errors() {
        assert!(matches!(
            load_world_from_string("..\n..."),
            Err(ConfigError::Map { line: 2, .. })
        ));
        assert!(matches!(
            load_world_from_string("..\n\n..."),
            Err(ConfigError::Map { line: 3, .. })
        ));
        assert!(matches!(
            load_world_from_string("\n...\n..x"),
            Err(ConfigError::Map { line: 3, .. })
        ));
        assert!(matches!(
            load_world_from_string("..x"),
            Err(ConfigError::Map { line: 1, .. })
        ));
        assert!(matches!(
            load_world_from_string("   \n"),
            Err(ConfigError::Map { line: 0, .. })
        ));
        assert_eq!(
            load_world_from_string("#.\n.#"),
            Err(ConfigError::InsufficientFreeCells { free: 2 })
        );
    }
}
