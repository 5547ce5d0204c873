use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub count: i64,
    pub page: i64,
    pub limit: i64,
    pub total_page: i64,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, count: i64, page: i64, limit: i64) -> Self {
        let total_page = if limit > 0 {
            (count + limit - 1) / limit
        } else {
            0
        };

        Self {
            count,
            page,
            limit,
            total_page,
            next_page: (page < total_page).then_some(page + 1),
            previous_page: (page > 1).then_some(page - 1),
            data,
        }
    }
}
