use serde::Serialize;

pub const DEFAULT_PLAN_ID: &str = "metal";

/// A subscription tier as rendered on the plan picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub duration_days: u32,
    pub duration_label: &'static str,
    pub price_amount: u32,
    pub price_display: &'static str,
    pub currency: &'static str,
    pub features: &'static [&'static str],
    pub button_label: &'static str,
    pub image_slug: &'static str,
    pub colors: [&'static str; 2],
    pub text_color: &'static str,
    pub is_dark: bool,
    pub sort_order: u8,
    pub is_current: bool,
}

const CATALOGUE: [SubscriptionPlan; 5] = [
    SubscriptionPlan {
        id: "metal",
        name: "Metal",
        duration_days: 30,
        duration_label: "30 Days",
        price_amount: 0,
        price_display: "Free",
        currency: "INR",
        features: &["1 Listing", "Free Posting", "Photos Posting (Upto 5MB)"],
        button_label: "Downgrade",
        image_slug: "metal",
        colors: ["#A4A4A4", "#A3A2A2"],
        text_color: "#000000",
        is_dark: false,
        sort_order: 1,
        is_current: false,
    },
    SubscriptionPlan {
        id: "bronze",
        name: "Bronze",
        duration_days: 60,
        duration_label: "60 Days",
        price_amount: 730,
        price_display: "₹ 730",
        currency: "INR",
        features: &[
            "5 Listing",
            "Chat Option",
            "Expert Property Description",
            "Buyer Contacts",
        ],
        button_label: "Downgrade",
        image_slug: "bronze",
        colors: ["#A35C2C", "#CF895A"],
        text_color: "#FFFFFF",
        is_dark: false,
        sort_order: 2,
        is_current: false,
    },
    SubscriptionPlan {
        id: "silver",
        name: "Silver",
        duration_days: 90,
        duration_label: "90 Days",
        price_amount: 1400,
        price_display: "₹ 1400",
        currency: "INR",
        features: &[
            "5 Listing",
            "Email Alerts",
            "Chat Option",
            "Get Buyer Contacts",
            "Expert Property Description",
        ],
        button_label: "Upgrade to Silver",
        image_slug: "sliver",
        colors: ["#EDECEA", "#BEBDBC"],
        text_color: "#000000",
        is_dark: false,
        sort_order: 3,
        is_current: false,
    },
    SubscriptionPlan {
        id: "gold",
        name: "Gold",
        duration_days: 120,
        duration_label: "120 Days",
        price_amount: 3500,
        price_display: "₹ 3500",
        currency: "INR",
        features: &[
            "7 Listing",
            "Video Posting",
            "SMS & Email Alerts",
            "Verified Tag",
            "Premium Visibility",
        ],
        button_label: "Upgrade to Gold",
        image_slug: "gold",
        colors: ["#F6ECA5", "#D79E08"],
        text_color: "#000000",
        is_dark: false,
        sort_order: 4,
        is_current: false,
    },
    SubscriptionPlan {
        id: "platinum",
        name: "Platinum",
        duration_days: 150,
        duration_label: "150 Days",
        price_amount: 5000,
        price_display: "₹ 5000",
        currency: "INR",
        features: &[
            "9 Listing",
            "All Gold Features",
            "Top Search Rank",
            "Dedicated Relationship Manager",
            "Social Media Promotion",
        ],
        button_label: "Upgrade to Platinum",
        image_slug: "platinum",
        colors: ["#315A81", "#1E2B4B"],
        text_color: "#FFFFFF",
        is_dark: true,
        sort_order: 5,
        is_current: false,
    },
];

/// Normalises a stored plan id, falling back to the free tier for unknown ids.
pub fn resolve_plan_id(raw: Option<&str>) -> &'static str {
    let wanted = raw.map(|id| id.trim().to_ascii_lowercase());
    CATALOGUE
        .iter()
        .find(|plan| wanted.as_deref() == Some(plan.id))
        .map_or(DEFAULT_PLAN_ID, |plan| plan.id)
}

pub fn find_plan(id: &str) -> Option<&'static SubscriptionPlan> {
    let id = id.trim().to_ascii_lowercase();
    CATALOGUE.iter().find(|plan| plan.id == id)
}

/// Full catalogue in display order with the user's current tier flagged.
pub fn plans_for(current_plan_id: &str) -> Vec<SubscriptionPlan> {
    CATALOGUE
        .iter()
        .map(|plan| {
            let mut plan = plan.clone();
            if plan.id == current_plan_id {
                plan.is_current = true;
                plan.button_label = "Active Plan";
            }
            plan
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanScreen {
    pub plans: Vec<SubscriptionPlan>,
    pub current_plan_id: &'static str,
    pub header: PlanHeader,
    pub footer: PlanFooter,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanHeader {
    pub title: &'static str,
    pub subtitle: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanFooter {
    pub secure_note: &'static str,
    pub help_text: &'static str,
}

impl PlanScreen {
    pub fn new(current_plan_id: &'static str) -> Self {
        Self {
            plans: plans_for(current_plan_id),
            current_plan_id,
            header: PlanHeader {
                title: "Choose your growth partner",
                subtitle: "Upgrade to higher tiers for better visibility and faster leads.",
            },
            footer: PlanFooter {
                secure_note: "Secure payment   |   Cancel anytime.",
                help_text: "Need help? Contact our support team.",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_or_missing_plan_falls_back_to_metal() {
        assert_eq!(resolve_plan_id(None), "metal");
        assert_eq!(resolve_plan_id(Some("diamond")), "metal");
        assert_eq!(resolve_plan_id(Some(" GOLD ")), "gold");
    }

    #[test]
    fn exactly_one_plan_is_current() {
        let plans = plans_for("gold");
        assert_eq!(plans.len(), 5);
        let current: Vec<_> = plans.iter().filter(|plan| plan.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].button_label, "Active Plan");
        let platinum = plans.iter().find(|plan| plan.id == "platinum").expect("listed");
        assert_eq!(platinum.button_label, "Upgrade to Platinum");
        assert!(plans.windows(2).all(|pair| pair[0].sort_order < pair[1].sort_order));
    }
}
