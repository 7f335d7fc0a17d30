// Entity models
//
// Purchases own their installments; credit cards, people, payment types and
// purchase types are reference data handled by the generic store.

pub mod credit_card;
pub mod installment;
pub mod purchase;
pub mod reference;

pub use credit_card::{find_credit_card, list_credit_cards, CardType, CreditCard, CreditCardListing};
pub use installment::{Installment, MAX_INSTALLMENTS};
pub use purchase::{
    parse_id, validate_date, validate_year_month, InstallmentTemplate, Purchase,
    PurchaseRequest, PurchaseResponse, PurchaseResponseTotal, DATE_FORMAT,
};
pub use reference::{PaymentType, Person, PurchaseType};
