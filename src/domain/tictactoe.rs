//! Two-player tic-tac-toe used by the live match screen.

use derive_more::Display;
use std::fmt;
use std::str::FromStr;
use strum::{Display as StrumDisplay, EnumString};

pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn as_char(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'X' => Some(Mark::X),
            'O' => Some(Mark::O),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board([Option<Mark>; 9]);

impl Board {
    pub fn get(&self, cell: usize) -> Option<Mark> {
        self.0.get(cell).copied().flatten()
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn winner(&self) -> Option<Mark> {
        WIN_LINES.iter().find_map(|[a, b, c]| match (self.0[*a], self.0[*b], self.0[*c]) {
            (Some(m), Some(n), Some(o)) if m == n && n == o => Some(m),
            _ => None,
        })
    }
}

/// Stored as nine characters, `-` for an empty cell.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.0 {
            let c = cell.map(Mark::as_char).unwrap_or('-');
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() != 9 {
            return Err(format!("board must have 9 cells, got '{s}'"));
        }
        let mut cells = [None; 9];
        for (i, c) in s.chars().enumerate() {
            cells[i] = match c {
                '-' => None,
                other => Some(Mark::from_char(other).ok_or_else(|| format!("bad cell '{other}'"))?),
            };
        }
        Ok(Board(cells))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Mark),
    Draw,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win(Mark::X) => "X",
            Outcome::Win(Mark::O) => "O",
            Outcome::Draw => "draw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub player_x: u64,
    pub player_o: Option<u64>,
    pub board: Board,
    pub next_turn: Mark,
    pub status: MatchStatus,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum MoveError {
    #[display(fmt = "Match is not waiting for an opponent")]
    NotWaiting,
    #[display(fmt = "You cannot join your own match")]
    OwnMatch,
    #[display(fmt = "Match is not active")]
    NotActive,
    #[display(fmt = "You are not a player in this match")]
    NotAPlayer,
    #[display(fmt = "It is not your turn")]
    NotYourTurn,
    #[display(fmt = "Cell must be between 0 and 8")]
    CellOutOfRange,
    #[display(fmt = "Cell is already taken")]
    CellOccupied,
}

impl MatchState {
    pub fn new(player_x: u64) -> Self {
        Self {
            player_x,
            player_o: None,
            board: Board::default(),
            next_turn: Mark::X,
            status: MatchStatus::Waiting,
            outcome: None,
        }
    }

    pub fn mark_of(&self, player: u64) -> Option<Mark> {
        if player == self.player_x {
            Some(Mark::X)
        } else if Some(player) == self.player_o {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn join(&self, player: u64) -> Result<MatchState, MoveError> {
        if self.status != MatchStatus::Waiting {
            return Err(MoveError::NotWaiting);
        }
        if player == self.player_x {
            return Err(MoveError::OwnMatch);
        }
        Ok(MatchState {
            player_o: Some(player),
            status: MatchStatus::Active,
            next_turn: Mark::X,
            ..self.clone()
        })
    }

    pub fn play(&self, player: u64, cell: usize) -> Result<MatchState, MoveError> {
        if self.status != MatchStatus::Active {
            return Err(MoveError::NotActive);
        }
        let mark = self.mark_of(player).ok_or(MoveError::NotAPlayer)?;
        if mark != self.next_turn {
            return Err(MoveError::NotYourTurn);
        }
        if cell > 8 {
            return Err(MoveError::CellOutOfRange);
        }
        if self.board.get(cell).is_some() {
            return Err(MoveError::CellOccupied);
        }

        let mut next = self.clone();
        next.board.0[cell] = Some(mark);
        next.next_turn = mark.other();

        if let Some(w) = next.board.winner() {
            next.status = MatchStatus::Finished;
            next.outcome = Some(Outcome::Win(w));
        } else if next.board.is_full() {
            next.status = MatchStatus::Finished;
            next.outcome = Some(Outcome::Draw);
        }
        Ok(next)
    }

    pub fn forfeit(&self, player: u64) -> Result<MatchState, MoveError> {
        if self.status != MatchStatus::Active {
            return Err(MoveError::NotActive);
        }
        let mark = self.mark_of(player).ok_or(MoveError::NotAPlayer)?;
        Ok(MatchState {
            status: MatchStatus::Finished,
            outcome: Some(Outcome::Win(mark.other())),
            ..self.clone()
        })
    }
}
