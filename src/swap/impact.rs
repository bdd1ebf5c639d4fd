use bigdecimal::BigDecimal;

/// Predicted effect of a swap, captured once when its plan is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Impact {
    /// Display quantity the swapper is predicted to pay into the pool.
    pub sell_qty: BigDecimal,
    /// Display quantity the swapper is predicted to receive.
    pub buy_qty: BigDecimal,
    /// Display pool price after the swap. Not the realized swap price.
    pub final_price: f64,
    /// Relative move of the pool price. Not the swapper's slippage.
    pub percent_change: f64,
}

impl Impact {
    pub fn new(
        sell_qty: BigDecimal,
        buy_qty: BigDecimal,
        start_price: f64,
        final_price: f64,
    ) -> Self {
        let percent_change = if start_price != 0.0 {
            (final_price - start_price) / start_price
        } else {
            0.0
        };
        Self {
            sell_qty,
            buy_qty,
            final_price,
            percent_change,
        }
    }
}
