//! Fixed option lists offered when editing a profile

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct InterestCategory {
    pub name: &'static str,
    pub interests: &'static [&'static str],
}

pub const INTEREST_CATEGORIES: &[InterestCategory] = &[
    InterestCategory {
        name: "Academic",
        interests: &[
            "Coding",
            "Data Science",
            "AI/ML",
            "Web Development",
            "Mobile Development",
            "Research",
            "Cybersecurity",
            "Cloud Computing",
            "Blockchain",
            "IoT",
            "Robotics",
            "UI/UX Design",
        ],
    },
    InterestCategory {
        name: "Sports",
        interests: &[
            "Basketball",
            "Football",
            "Cricket",
            "Tennis",
            "Badminton",
            "Swimming",
            "Volleyball",
            "Table Tennis",
            "Chess",
            "Running",
            "Cycling",
            "Yoga",
        ],
    },
    InterestCategory {
        name: "Creative",
        interests: &[
            "Photography",
            "Art & Design",
            "Video Editing",
            "Music Production",
            "Writing",
            "Dancing",
            "Drawing",
            "Painting",
            "Crafts",
            "Fashion Design",
            "Animation",
            "Graphic Design",
        ],
    },
    InterestCategory {
        name: "Entertainment",
        interests: &[
            "Gaming",
            "Anime",
            "Podcasts",
            "Movies",
            "Reading",
            "Travel",
            "Cooking",
            "Baking",
            "Music",
            "TV Shows",
            "Concerts",
            "Board Games",
        ],
    },
];

pub const SOCIETIES: &[&str] = &[
    "KdeWreck",
    "Kinecta",
    "AI Soc",
    "Society 1",
    "Society 2",
    "Society 3",
    "Society 4",
];

/// Every interest across all categories, in catalog order
pub fn all_interests() -> Vec<&'static str> {
    INTEREST_CATEGORIES
        .iter()
        .flat_map(|c| c.interests.iter().copied())
        .collect()
}

/// Academic year for a semester; two semesters per year
pub fn year_from_semester(semester: u8) -> Option<u8> {
    match semester {
        1..=8 => Some(semester.div_ceil(2)),
        _ => None,
    }
}
