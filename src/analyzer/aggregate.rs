use super::categorizer::Category;
use crate::db::HistoryRecord;
use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daypart {
    Morning,
    Afternoon,
    Evening,
    Late,
}

impl Daypart {
    pub fn of_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Daypart::Morning,
            12..=16 => Daypart::Afternoon,
            17..=21 => Daypart::Evening,
            _ => Daypart::Late,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaypartCounts {
    pub morning: usize,
    pub afternoon: usize,
    pub evening: usize,
    pub late: usize,
}

impl DaypartCounts {
    fn add(&mut self, daypart: Daypart) {
        match daypart {
            Daypart::Morning => self.morning += 1,
            Daypart::Afternoon => self.afternoon += 1,
            Daypart::Evening => self.evening += 1,
            Daypart::Late => self.late += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedResource {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub total: usize,
    pub unique_resources: usize,
    pub reported_visits: u64,
    pub categories: BTreeMap<Category, usize>,
    pub top_resources: Vec<RankedResource>,
    pub dayparts: DaypartCounts,
    pub focus_ratio: u32,
}

impl CategoryAggregate {
    pub fn category_count(&self, category: Category) -> usize {
        self.categories.get(&category).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub current: usize,
    pub previous: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverWeek {
    pub total: Change,
    pub focus_ratio: Change,
    pub categories: BTreeMap<Category, Change>,
}

/// Counts one record per event. `resource` picks the ranking key (domain,
/// channel, ...).
pub fn aggregate<F>(records: &[HistoryRecord], resource: F) -> CategoryAggregate
where
    F: Fn(&HistoryRecord) -> String,
{
    let mut categories = BTreeMap::new();
    let mut dayparts = DaypartCounts::default();
    let mut ranking: Vec<RankedResource> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut reported_visits = 0_u64;

    for record in records {
        *categories.entry(record.category).or_insert(0) += 1;
        dayparts.add(Daypart::of_hour(
            record.occurred_at.with_timezone(&Local).hour(),
        ));
        reported_visits += u64::from(record.occurrences);

        let name = resource(record);
        match positions.get(&name) {
            Some(index) => ranking[*index].count += 1,
            None => {
                positions.insert(name.clone(), ranking.len());
                ranking.push(RankedResource { name, count: 1 });
            }
        }
    }

    let unique_resources = ranking.len();
    // stable: equal counts keep first-seen order
    ranking.sort_by(|left, right| right.count.cmp(&left.count));
    ranking.truncate(TOP_N);

    let total = records.len();
    let focus = categories
        .iter()
        .filter(|(category, _)| category.is_focus())
        .map(|(_, count)| *count)
        .sum::<usize>();

    CategoryAggregate {
        total,
        unique_resources,
        reported_visits,
        categories,
        top_resources: ranking,
        dayparts,
        focus_ratio: focus_ratio(focus, total),
    }
}

pub fn focus_ratio(focus: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }

    (100.0 * focus as f64 / total as f64).round() as u32
}

/// Categories missing from either side count as zero.
pub fn compare(current: &CategoryAggregate, previous: &CategoryAggregate) -> WeekOverWeek {
    let categories = current
        .categories
        .keys()
        .chain(previous.categories.keys())
        .map(|category| {
            (
                *category,
                Change {
                    current: current.category_count(*category),
                    previous: previous.category_count(*category),
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    WeekOverWeek {
        total: Change {
            current: current.total,
            previous: previous.total,
        },
        focus_ratio: Change {
            current: current.focus_ratio as usize,
            previous: previous.focus_ratio as usize,
        },
        categories,
    }
}
