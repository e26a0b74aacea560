use crate::domain::entities::position::PositionSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side of the order that opens `side`. `None` for a flat side.
    pub fn opening(side: PositionSide) -> Option<Self> {
        match side {
            PositionSide::Long => Some(OrderSide::Buy),
            PositionSide::Short => Some(OrderSide::Sell),
            PositionSide::Flat => None,
        }
    }

    /// Side of the reduce-only order that closes `side`.
    pub fn closing(side: PositionSide) -> Option<Self> {
        Self::opening(side).map(|s| s.opposite())
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Wire spelling used by the exchange
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_and_closing_sides() {
        assert_eq!(OrderSide::opening(PositionSide::Long), Some(OrderSide::Buy));
        assert_eq!(OrderSide::opening(PositionSide::Short), Some(OrderSide::Sell));
        assert_eq!(OrderSide::closing(PositionSide::Long), Some(OrderSide::Sell));
        assert_eq!(OrderSide::closing(PositionSide::Short), Some(OrderSide::Buy));
        assert_eq!(OrderSide::closing(PositionSide::Flat), None);
    }

    #[test]
    fn test_wire_spelling() {
        assert_eq!(OrderSide::Buy.as_str(), "Buy");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }
}
