//! ClickHouse DDL rendering for log storages.
//!
//! A storage `t` in database `db` is three engine objects:
//! - `db.t`: MergeTree data table with a TTL on `_time_second_`
//! - `db.t_stream`: Kafka engine table reading JSONEachRow messages
//! - `db.t_view`: materialized view moving stream rows into the data table
//!
//! Trace-enabled storages also own `db.t_jaeger_dependencies`.

use crate::types::FieldType;

pub const TIME_SECOND_FIELD: &str = "_time_second_";
pub const TIME_NANOSECOND_FIELD: &str = "_time_nanosecond_";
pub const RAW_LOG_FIELD: &str = "_raw_log_";

/// Database, optional cluster and base table name of a storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableTarget {
    pub database: String,
    pub cluster: String,
    pub table: String,
}

impl TableTarget {
    fn qualified(&self, suffix: &str) -> String {
        format!("`{}`.`{}{}`", self.database, self.table, suffix)
    }

    pub fn data_table(&self) -> String {
        self.qualified("")
    }

    pub fn stream_table(&self) -> String {
        self.qualified("_stream")
    }

    pub fn view_table(&self) -> String {
        self.qualified("_view")
    }

    pub fn dependencies_table(&self) -> String {
        self.qualified("_jaeger_dependencies")
    }

    fn on_cluster(&self) -> String {
        if self.cluster.is_empty() {
            String::new()
        } else {
            format!(" ON CLUSTER `{}`", self.cluster)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub consumer_num: i32,
    pub skip_broken_messages: i32,
}

/// How the source time field is encoded in Kafka messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFieldType {
    /// Date-time string, parsed best effort.
    #[default]
    DateTimeString,
    /// Unix seconds, possibly fractional.
    UnixSeconds,
    /// Unix milliseconds.
    UnixMillis,
}

impl TimeFieldType {
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::DateTimeString),
            1 => Some(Self::UnixSeconds),
            2 => Some(Self::UnixMillis),
            _ => None,
        }
    }

    const fn stream_type(self) -> &'static str {
        match self {
            Self::DateTimeString => "String",
            Self::UnixSeconds => "Float64",
            Self::UnixMillis => "Int64",
        }
    }

    fn second_expr(self, field: &str) -> String {
        match self {
            Self::DateTimeString => format!("parseDateTimeBestEffort(`{field}`)"),
            Self::UnixSeconds => format!("toDateTime(toInt64(`{field}`))"),
            Self::UnixMillis => format!("toDateTime(intDiv(`{field}`, 1000))"),
        }
    }

    fn nanosecond_expr(self, field: &str) -> String {
        match self {
            Self::DateTimeString => format!("parseDateTime64BestEffort(`{field}`, 9)"),
            Self::UnixSeconds => format!("toDateTime64(`{field}`, 9)"),
            Self::UnixMillis => format!("toDateTime64(fromUnixTimestamp64Milli(`{field}`), 9)"),
        }
    }
}

/// A top-level field of the JSON messages on the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    pub name: String,
    pub typ: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateStorage {
    pub target: TableTarget,
    pub days: i32,
    pub kafka: KafkaSettings,
    pub time_field: String,
    pub time_field_type: TimeFieldType,
    pub raw_log_field: String,
    pub fields: Vec<SourceField>,
}

/// Statements a storage was created with, kept on the metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageSql {
    pub data: String,
    pub stream: String,
    pub view: String,
}

pub fn alter_ttl(target: &TableTarget, days: i32) -> String {
    format!(
        "ALTER TABLE {}{} MODIFY TTL toDateTime({TIME_SECOND_FIELD}) + INTERVAL {days} DAY",
        target.data_table(),
        target.on_cluster(),
    )
}

pub fn drop_stream(target: &TableTarget) -> String {
    format!(
        "DROP TABLE IF EXISTS {}{}",
        target.stream_table(),
        target.on_cluster()
    )
}

fn kafka_group_name(target: &TableTarget) -> String {
    format!("{}_{}", target.database, target.table)
}

/// Kafka engine table with `columns` as the column list body.
pub fn create_stream(target: &TableTarget, columns: &str, kafka: &KafkaSettings) -> String {
    format!(
        "CREATE TABLE {}{}\n(\n{}\n)\nENGINE = Kafka\nSETTINGS kafka_broker_list = '{}', \
         kafka_topic_list = '{}', kafka_group_name = '{}', kafka_format = 'JSONEachRow', \
         kafka_num_consumers = {}, kafka_skip_broken_messages = {}",
        target.stream_table(),
        target.on_cluster(),
        columns.trim_matches('\n'),
        escape(&kafka.brokers),
        escape(&kafka.topic),
        escape(&kafka_group_name(target)),
        kafka.consumer_num.max(1),
        kafka.skip_broken_messages.max(0),
    )
}

/// Returns the column list body of a `CREATE TABLE` statement, without the
/// enclosing parentheses.
pub fn column_block(create_sql: &str) -> Option<&str> {
    let start = create_sql.find('(')?;
    let mut depth = 0usize;
    for (offset, c) in create_sql[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&create_sql[start + 1..start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn create_jaeger_dependencies(target: &TableTarget, days: i32) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}{}\n(\n  `timestamp` DateTime,\n  `parent` String,\n  \
         `child` String,\n  `call_count` UInt64\n)\nENGINE = SummingMergeTree\n\
         PARTITION BY toYYYYMMDD(timestamp)\nORDER BY (timestamp, parent, child)\n\
         TTL timestamp + INTERVAL {days} DAY",
        target.dependencies_table(),
        target.on_cluster(),
    )
}

pub fn drop_jaeger_dependencies(target: &TableTarget) -> String {
    format!(
        "DROP TABLE IF EXISTS {}{}",
        target.dependencies_table(),
        target.on_cluster()
    )
}

fn log_fields<'a>(req: &'a CreateStorage) -> impl Iterator<Item = &'a SourceField> {
    req.fields.iter().filter(|f| f.name != req.time_field)
}

/// Renders the data, stream and view statements for a new storage.
pub fn create_storage(req: &CreateStorage) -> StorageSql {
    let target = &req.target;

    let mut data_columns = vec![
        format!("  `{TIME_SECOND_FIELD}` DateTime"),
        format!("  `{TIME_NANOSECOND_FIELD}` DateTime64(9)"),
    ];
    data_columns.extend(
        log_fields(req).map(|f| format!("  `{}` {}", f.name, f.typ.clickhouse_type())),
    );
    data_columns.push(format!("  `{RAW_LOG_FIELD}` String CODEC(ZSTD(1))"));
    data_columns.push(format!(
        "  INDEX idx_raw_log {RAW_LOG_FIELD} TYPE tokenbf_v1(30720, 2, 0) GRANULARITY 1"
    ));

    let data = format!(
        "CREATE TABLE {}{}\n(\n{}\n)\nENGINE = MergeTree\nPARTITION BY toYYYYMMDD({TIME_SECOND_FIELD})\n\
         ORDER BY {TIME_SECOND_FIELD}\nTTL toDateTime({TIME_SECOND_FIELD}) + INTERVAL {} DAY\n\
         SETTINGS index_granularity = 8192",
        target.data_table(),
        target.on_cluster(),
        data_columns.join(",\n"),
        req.days,
    );

    let stream_columns: Vec<String> = req
        .fields
        .iter()
        .map(|f| {
            let typ = if f.name == req.time_field {
                req.time_field_type.stream_type()
            } else {
                f.typ.clickhouse_type()
            };
            format!("  `{}` {typ}", f.name)
        })
        .collect();
    let stream = create_stream(target, &stream_columns.join(",\n"), &req.kafka);

    let raw_log = if req.raw_log_field.is_empty() {
        let all: Vec<String> = req.fields.iter().map(|f| format!("`{}`", f.name)).collect();
        format!("formatRowNoNewline('JSONEachRow', {})", all.join(", "))
    } else {
        format!("toString(`{}`)", req.raw_log_field)
    };

    let mut selects = vec![
        format!(
            "  {} AS `{TIME_SECOND_FIELD}`",
            req.time_field_type.second_expr(&req.time_field)
        ),
        format!(
            "  {} AS `{TIME_NANOSECOND_FIELD}`",
            req.time_field_type.nanosecond_expr(&req.time_field)
        ),
    ];
    selects.extend(log_fields(req).map(|f| format!("  `{}`", f.name)));
    selects.push(format!("  {raw_log} AS `{RAW_LOG_FIELD}`"));

    let view = format!(
        "CREATE MATERIALIZED VIEW {}{} TO {} AS\nSELECT\n{}\nFROM {}",
        target.view_table(),
        target.on_cluster(),
        target.data_table(),
        selects.join(",\n"),
        target.stream_table(),
    );

    StorageSql { data, stream, view }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
