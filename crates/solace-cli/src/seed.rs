use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use solace_db::Database;
use solace_db::models::ProfileRow;

struct DemoSupporter {
    name: &'static str,
    bio: &'static str,
    training_level: &'static str,
    topics: &'static [&'static str],
    available: bool,
}

const DEMO_SUPPORTERS: &[DemoSupporter] = &[
    DemoSupporter {
        name: "Alex",
        bio: "Been through burnout twice. Happy to just listen.",
        training_level: "mhfa_certified",
        topics: &["burnout", "work", "stress"],
        available: true,
    },
    DemoSupporter {
        name: "Blair",
        bio: "Night owl, good with anxious spirals.",
        training_level: "trained",
        topics: &["anxiety", "general"],
        available: true,
    },
    DemoSupporter {
        name: "Casey",
        bio: "Lost a parent last year.",
        training_level: "peer",
        topics: &["bereavement", "low_mood"],
        available: false,
    },
];

/// Insert a few demo supporters into an empty database. Returns how many were added.
pub fn seed_demo(db: &Database) -> Result<usize> {
    if db.count_supporters()? > 0 {
        info!("Database already has supporters, skipping demo seed");
        return Ok(0);
    }

    for demo in DEMO_SUPPORTERS {
        let user_id = Uuid::new_v4().to_string();
        let topics = serde_json::to_string(demo.topics)?;
        db.create_supporter(
            &Uuid::new_v4().to_string(),
            &user_id,
            &ProfileRow {
                display_name: demo.name,
                bio: Some(demo.bio),
                avatar_url: None,
                training_level: demo.training_level,
                topics: &topics,
            },
        )?;
        if demo.available {
            db.toggle_availability(&user_id)?;
        }
    }

    info!("Seeded {} demo supporters", DEMO_SUPPORTERS.len());
    Ok(DEMO_SUPPORTERS.len())
}
