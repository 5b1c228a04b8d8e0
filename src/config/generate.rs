pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# INGESTOR CONFIGURATION
# =============================================================================
# Settings for generating synthetic event records and bulk-loading them into
# an Elasticsearch/OpenSearch compatible document store.
#
# Every key is optional; omitted keys fall back to the values shown here.
# Values may reference environment variables with $env{VAR_NAME}.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/ingestor/config.yml
#   3. /etc/ingestor/config.yml

# =============================================================================
# DOCUMENT STORE
# =============================================================================

store:
  # Base URL of the store; bulk requests go to <url>/_bulk
  url: http://localhost:9200
  # Collection every document is written to
  index: events
  # Per-request timeout
  timeout: 30s
  # Optional basic auth
  # username: ingest
  # password: changeme

# =============================================================================
# INGESTION
# =============================================================================

ingest:
  # Number of records to generate and upload
  total_records: 100000
  # Documents per bulk request
  batch_size: 1000
  # Maximum bulk requests in flight at once
  concurrency: 1
  # Records generated between scheduler yields
  chunk_size: 100
  # Capacity of each channel between pipeline stages
  channel_capacity: 100

# =============================================================================
# PROGRESS REPORTING
# =============================================================================

progress:
  # Minimum time between progress lines
  interval: 2s

# =============================================================================
# ERROR LOG
# =============================================================================

errors:
  # JSON-lines file that failed documents are appended to
  path: ingest-errors.jsonl
  # Flush buffered entries once this many have accumulated
  flush_threshold: 1000
"#
    .to_string()
}
