mod discount;
mod reference_extractor;

pub use discount::{resolve_discount, DiscountRejection};
pub use reference_extractor::{
    extract_order_id,
    payment_reference,
    DEFAULT_MIN_REFERENCE_RUN,
    REFERENCE_MARKER,
};
