// 📊 Installment Aggregator - paid / unpaid / total over any installment set
//
// Shared by every installment read path (by purchase, by month, unpaid);
// how the set was filtered upstream makes no difference here.

use serde::{Deserialize, Serialize};

use crate::entities::Installment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSummary {
    pub items: Vec<Installment>,
    pub paid_sum: f64,
    pub unpaid_sum: f64,
    pub total: f64,
}

pub fn aggregate(items: Vec<Installment>) -> InstallmentSummary {
    let (paid_sum, unpaid_sum) = items.iter().fold((0.0, 0.0), |(paid, unpaid), inst| {
        if inst.paid {
            (paid + inst.value, unpaid)
        } else {
            (paid, unpaid + inst.value)
        }
    });

    InstallmentSummary {
        items,
        paid_sum,
        unpaid_sum,
        total: paid_sum + unpaid_sum,
    }
}
