use crate::domain::value_objects::position_sizing::Bracket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "FLAT"),
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// The single tracked position of the symbol.
///
/// Fields are private so a flat position always carries zero quantity and
/// zero levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    side: PositionSide,
    entry_price: f64,
    quantity: f64,
    stop_loss: f64,
    take_profit: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl Position {
    pub fn flat() -> Self {
        Position {
            side: PositionSide::Flat,
            entry_price: 0.0,
            quantity: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    /// Open a position. Opening on the flat side yields a flat position.
    pub fn open(side: PositionSide, entry_price: f64, quantity: f64, bracket: Bracket) -> Self {
        if side == PositionSide::Flat {
            return Self::flat();
        }
        Position {
            side,
            entry_price,
            quantity,
            stop_loss: bracket.stop_loss,
            take_profit: bracket.take_profit,
        }
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    pub fn clear(&mut self) {
        *self = Self::flat();
    }

    /// Move the stop towards `candidate` if that tightens it.
    ///
    /// Long stops only rise, short stops only fall. Returns whether the stop
    /// moved.
    pub fn trail_stop(&mut self, candidate: f64) -> bool {
        if !candidate.is_finite() {
            return false;
        }
        let tighter = match self.side {
            PositionSide::Long => candidate > self.stop_loss,
            PositionSide::Short => candidate < self.stop_loss,
            PositionSide::Flat => false,
        };
        if tighter {
            self.stop_loss = candidate;
        }
        tighter
    }

    /// Whether `price` has crossed the tracked stop.
    pub fn is_stop_breached(&self, price: f64) -> bool {
        match self.side {
            PositionSide::Long => price <= self.stop_loss,
            PositionSide::Short => price >= self.stop_loss,
            PositionSide::Flat => false,
        }
    }

    /// Unrealized profit at `price`, zero when flat
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - price) * self.quantity,
            PositionSide::Flat => 0.0,
        }
    }
}
